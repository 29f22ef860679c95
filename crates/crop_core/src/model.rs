//! Scenario orchestration over the lookup tables and a layer store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::catalog::{CropCatalog, CropInfo};
use crate::controls::{ControlsState, ModelControls, ModelState, PersistedState};
use crate::datum::{CropDatum, ScenarioDatum};
use crate::error::{ModelError, SanityError};
use crate::layers::{LayerName, LayerStore, Location};
use crate::mgmt::{MgmtComponent, MgmtInputs};
use crate::nullable::{self, nonzero, or_truthy, truthy};
use crate::tables::{ClimateBinTable, YieldModelTable};
use crate::yield_model::{YieldModel, YieldModelResult};

/// Read-only data shared by every scenario computation.
#[derive(Clone, Debug, Default)]
pub struct ModelTables {
    pub climate_bins: ClimateBinTable,
    /// Yield model coefficients keyed by crop name.
    pub yield_models: BTreeMap<String, YieldModelTable>,
    pub crops: CropCatalog,
}

impl ModelTables {
    pub fn new(
        climate_bins: ClimateBinTable,
        yield_models: BTreeMap<String, YieldModelTable>,
        crops: CropCatalog,
    ) -> Self {
        Self {
            climate_bins,
            yield_models,
            crops,
        }
    }

    pub fn yield_model(&self, crop: &str) -> Option<YieldModel<'_>> {
        self.yield_models.get(crop).map(YieldModel::new)
    }

    pub fn has_yield_model(&self, crop: &str) -> bool {
        self.yield_models.contains_key(crop)
    }

    /// Climate bin and its potential yield for `crop`. Zero or NaN climate
    /// values never resolve to a bin.
    fn climate_bin(
        &self,
        crop: &str,
        precip: Option<f64>,
        gdd: Option<f64>,
    ) -> (Option<u32>, Option<f64>) {
        let bin = match (nonzero(precip), nonzero(gdd)) {
            (Some(precip), Some(gdd)) => self.climate_bins.find_bin(crop, precip, gdd),
            _ => None,
        };
        let potential_yield =
            bin.and_then(|bin| self.climate_bins.find_potential_yield(crop, bin));
        (bin, potential_yield)
    }
}

/// Fractional nutrient changes for the sensitivity path; `0.1` is +10 %.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensitivityAdjustment {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
}

impl SensitivityAdjustment {
    /// Scale the nutrients of `inputs`; irrigation is left as is.
    pub fn apply(&self, inputs: &MgmtInputs) -> MgmtInputs {
        let factor = |change: f64| Some(1.0 + change);
        MgmtInputs::new([
            nullable::mul(inputs.nitrogen(), factor(self.nitrogen)),
            nullable::mul(inputs.phosphorus(), factor(self.phosphorus)),
            nullable::mul(inputs.potassium(), factor(self.potassium)),
            inputs.irrigation(),
        ])
    }
}

/// Layer values of one cell before any scenario is applied.
#[derive(Clone, Copy, Debug)]
struct Baseline {
    crop_yield: Option<f64>,
    area: Option<f64>,
    precip: Option<f64>,
    gdd: Option<f64>,
    inputs: MgmtInputs,
}

/// Climate of one cell under the scenario.
#[derive(Clone, Copy, Debug)]
struct ScenarioClimate {
    /// Changed precipitation, `None` when unchanged.
    precip: Option<f64>,
    /// Changed GDD, `None` when unchanged.
    gdd: Option<f64>,
    /// Re-resolved bin, `None` when the climate did not change or no bin
    /// encloses it.
    bin: Option<u32>,
    potential_yield: Option<f64>,
}

/// Crop model for the currently selected scenario.
#[derive(Debug)]
pub struct CropModel<L> {
    tables: ModelTables,
    layers: L,
    controls: ModelControls,
    state: ModelState,
}

impl<L: LayerStore> CropModel<L> {
    /// Create a model and bind its layers for `controls`.
    pub fn new(
        tables: ModelTables,
        layers: L,
        controls: ModelControls,
    ) -> Result<Self, ModelError> {
        let mut model = Self {
            tables,
            layers,
            controls: controls.clone(),
            state: ModelState::default(),
        };
        model.set_controls(controls)?;
        Ok(model)
    }

    /// Switch to a new scenario. Rebinds every data layer for the crop, resets
    /// the computed scenario layers and recomputes the model state.
    pub fn set_controls(&mut self, controls: ModelControls) -> Result<(), ModelError> {
        let info = self.tables.crops.crop_info(&controls.crop)?.clone();
        let base_gdd = self.tables.crops.gdd_source(&controls.crop, 0.0)?;
        let scenario_gdd = self
            .tables
            .crops
            .gdd_source(&controls.crop, controls.temp_change)?;

        self.layers.bind_layer(LayerName::Yield, info.yield_source());
        self.layers.bind_layer(LayerName::Area, info.area_source());
        self.layers
            .bind_layer(LayerName::Precip, CropCatalog::precip_source());
        self.layers.bind_layer(LayerName::BaseGdd, base_gdd);
        self.layers.bind_layer(LayerName::ScenarioGdd, scenario_gdd);
        self.bind_mgmt_layers(&info);
        self.refresh_computed_layers();

        self.controls = controls;
        self.state = self.compute_state();
        debug!(
            crop = %self.controls.crop,
            precip_change = self.controls.precip_change,
            temp_change = self.controls.temp_change,
            overrides = %self.controls.mgmt_overrides,
            state = ?self.state,
            "model controls updated"
        );
        Ok(())
    }

    fn bind_mgmt_layers(&mut self, info: &CropInfo) {
        for component in MgmtComponent::ALL {
            let layer = LayerName::applied(component);
            match info.mgmt_source(component) {
                Some(source) => self.layers.bind_layer(layer, source),
                None => self.layers.remove_layer(layer),
            }
        }
    }

    fn refresh_computed_layers(&mut self) {
        self.layers
            .replace_computed_layer(LayerName::ScenarioYield, LayerName::Yield);
        self.layers
            .replace_computed_layer(LayerName::ScenarioPrecip, LayerName::Precip);
        for component in MgmtComponent::ALL {
            let base = LayerName::applied(component);
            self.layers
                .replace_computed_layer(LayerName::scenario_applied(component), base);
            self.layers
                .replace_computed_layer(LayerName::scenario_excess(component), base);
        }
    }

    fn compute_state(&self) -> ModelState {
        let has_layer = |component| self.layers.has_layer(LayerName::applied(component));
        ModelState {
            has_fertilizer_data: [
                MgmtComponent::Nitrogen,
                MgmtComponent::Phosphorus,
                MgmtComponent::Potassium,
            ]
            .into_iter()
            .all(has_layer),
            has_irrigation_data: has_layer(MgmtComponent::Irrigation),
            has_yield_model: self.tables.has_yield_model(&self.controls.crop),
        }
    }

    pub fn controls(&self) -> &ModelControls {
        &self.controls
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn tables(&self) -> &ModelTables {
        &self.tables
    }

    pub fn layers(&self) -> &L {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut L {
        &mut self.layers
    }

    pub fn crop_names(&self) -> Vec<&str> {
        self.tables.crops.crop_names()
    }

    pub fn check_scenario_sanity(&self, controls: &ModelControls) -> Result<(), SanityError> {
        crate::controls::check_scenario_sanity(controls, &self.tables.crops)
    }

    pub fn current_state(&self) -> PersistedState {
        PersistedState {
            model_controls: Some(self.controls.current_state()),
        }
    }

    /// Restore persisted controls and rebind layers for them.
    pub fn set_current_state(&mut self, state: &PersistedState) -> Result<(), ModelError> {
        match &state.model_controls {
            Some(saved) => self.apply_controls_state(saved),
            None => Ok(()),
        }
    }

    fn apply_controls_state(&mut self, saved: &ControlsState) -> Result<(), ModelError> {
        let mut controls = self.controls.clone();
        controls.set_current_state(saved);
        self.set_controls(controls)
    }

    fn read_baseline(&self, location: &Location) -> Baseline {
        let value = |layer| self.layers.value(location, layer);
        Baseline {
            crop_yield: value(LayerName::Yield),
            area: value(LayerName::Area),
            precip: value(LayerName::Precip),
            gdd: value(LayerName::BaseGdd),
            inputs: MgmtInputs::new(
                MgmtComponent::ALL.map(|component| value(LayerName::applied(component))),
            ),
        }
    }

    /// Baseline datum: empirical values, resolved climate bin and, when the
    /// full model can run, the modeled baseline yield and excess.
    fn baseline_datum(&self, baseline: &Baseline) -> Result<CropDatum, ModelError> {
        let crop = self.controls.crop.as_str();
        let (bin, potential_yield) =
            self.tables.climate_bin(crop, baseline.precip, baseline.gdd);
        let result = match self.runnable_yield_model() {
            Some(model) => model.forward(bin, &baseline.inputs)?,
            None => YieldModelResult::new(baseline.crop_yield, MgmtInputs::EMPTY),
        };
        Ok(CropDatum::new(
            baseline.crop_yield,
            baseline.precip,
            baseline.gdd,
            bin,
            potential_yield,
            baseline.inputs,
            result,
        ))
    }

    fn scenario_climate(
        &self,
        location: &Location,
        baseline: &Baseline,
        base: &CropDatum,
    ) -> ScenarioClimate {
        let precip_change = self.controls.precip_change;
        let precip = if truthy(baseline.precip) && truthy(Some(precip_change)) {
            baseline
                .precip
                .map(|precip| precip * (100.0 + precip_change) / 100.0)
        } else {
            None
        };
        let scenario_gdd = self.layers.value(location, LayerName::ScenarioGdd);
        let gdd = if scenario_gdd == baseline.gdd {
            None
        } else {
            scenario_gdd
        };

        // Unlike the baseline lookup, a zero baseline value still re-resolves.
        let bin = if truthy(precip) || truthy(gdd) {
            match (or_truthy(precip, baseline.precip), or_truthy(gdd, baseline.gdd)) {
                (Some(precip), Some(gdd)) => {
                    self.tables
                        .climate_bins
                        .find_bin(&self.controls.crop, precip, gdd)
                }
                _ => None,
            }
        } else {
            None
        };
        let potential_yield = match bin {
            Some(bin) => self
                .tables
                .climate_bins
                .find_potential_yield(&self.controls.crop, bin),
            None => base.potential_yield(),
        };
        ScenarioClimate {
            precip,
            gdd,
            bin,
            potential_yield,
        }
    }

    fn runnable_yield_model(&self) -> Option<YieldModel<'_>> {
        if self.state.can_run_yield_model() {
            self.tables.yield_model(&self.controls.crop)
        } else {
            None
        }
    }

    /// Baseline and scenario for one cell under the current controls.
    ///
    /// Writes scenario yield, precipitation, applied inputs and excess to the
    /// computed layers. Missing data comes back as `None`; only an unknown
    /// coefficient column is an error.
    pub fn compute_scenario_datum(
        &mut self,
        location: Location,
    ) -> Result<ScenarioDatum, ModelError> {
        let baseline = self.read_baseline(&location);
        let base = self.baseline_datum(&baseline)?;
        let climate = self.scenario_climate(&location, &baseline, &base);
        let model_bias = base.model_bias();
        let scenario_inputs = baseline.inputs.overlay(&self.controls.mgmt_overrides);

        let scenario_result = match self.runnable_yield_model() {
            Some(model) => {
                let bin = climate.bin.or(base.climate_bin());
                let result = model.forward(bin, &scenario_inputs)?;
                let modeled = result.modeled_yield();
                let corrected = match nonzero(model_bias) {
                    Some(bias) => modeled.map(|modeled| modeled / bias),
                    None => modeled,
                };
                YieldModelResult::new(corrected, *result.excess())
            }
            None => YieldModelResult::new(
                scaled_by_potential(&base, climate.potential_yield),
                *base.mgmt_excess(),
            ),
        };
        let scenario_yield = scenario_result.modeled_yield();
        let scenario_precip = climate.precip.or(baseline.precip);
        let scenario = CropDatum::new(
            scenario_yield,
            scenario_precip,
            climate.gdd.or(baseline.gdd),
            climate.bin.or(base.climate_bin()),
            climate.potential_yield,
            scenario_inputs,
            scenario_result,
        );

        self.layers
            .set_value(&location, LayerName::ScenarioYield, scenario_yield);
        self.layers
            .set_value(&location, LayerName::ScenarioPrecip, scenario_precip);
        for component in MgmtComponent::ALL {
            self.layers.set_value(
                &location,
                LayerName::scenario_applied(component),
                scenario_inputs.get(component),
            );
            self.layers.set_value(
                &location,
                LayerName::scenario_excess(component),
                scenario_result.excess().get(component),
            );
        }
        trace!(
            %location,
            base_yield = ?baseline.crop_yield,
            scenario_yield = ?scenario_yield,
            bin = ?base.climate_bin(),
            scenario_bin = ?climate.bin,
            "scenario datum computed"
        );

        Ok(ScenarioDatum::new(location, baseline.area, base, scenario, model_bias))
    }

    /// Fast sensitivity estimate for nutrient changes given as fractions.
    ///
    /// Runs the simplified yield model in the baseline climate bin and writes
    /// only the scenario and baseline yield layers.
    pub fn compute_scenario_datum_simplified(
        &mut self,
        location: Location,
        adjustment: SensitivityAdjustment,
    ) -> Result<ScenarioDatum, ModelError> {
        let baseline = self.read_baseline(&location);
        let base = self.baseline_datum(&baseline)?;
        let climate = self.scenario_climate(&location, &baseline, &base);
        let model_bias = base.model_bias();
        let scenario_inputs = adjustment.apply(&baseline.inputs);

        let scenario_result = match self.runnable_yield_model() {
            Some(model) => model.forward_simplified(
                base.climate_bin(),
                &baseline.inputs,
                &scenario_inputs,
                baseline.crop_yield,
            )?,
            None => YieldModelResult::new(
                scaled_by_potential(&base, climate.potential_yield),
                *base.mgmt_excess(),
            ),
        };
        let scenario_yield = scenario_result.modeled_yield();
        let scenario = CropDatum::new(
            scenario_yield,
            climate.precip.or(baseline.precip),
            climate.gdd.or(baseline.gdd),
            climate.bin.or(base.climate_bin()),
            climate.potential_yield,
            scenario_inputs,
            scenario_result,
        );

        self.layers
            .set_value(&location, LayerName::ScenarioYield, scenario_yield);
        self.layers
            .set_value(&location, LayerName::Yield, baseline.crop_yield);
        trace!(
            %location,
            base_yield = ?baseline.crop_yield,
            scenario_yield = ?scenario_yield,
            "sensitivity datum computed"
        );

        Ok(ScenarioDatum::new(location, baseline.area, base, scenario, model_bias))
    }
}

/// Empirical yield scaled by the change in potential yield, or unchanged when
/// either potential is unknown.
fn scaled_by_potential(base: &CropDatum, scenario_potential: Option<f64>) -> Option<f64> {
    match (scenario_potential, nonzero(base.potential_yield())) {
        (Some(scenario_potential), Some(base_potential)) => base
            .yield_()
            .map(|crop_yield| crop_yield * scenario_potential / base_potential),
        _ => base.yield_(),
    }
}
