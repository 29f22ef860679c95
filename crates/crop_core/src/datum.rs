//! Per-cell snapshots of the baseline and the scenario.

use serde::Serialize;

use crate::layers::Location;
use crate::mgmt::{MgmtComponent, MgmtInputs};
use crate::nullable;
use crate::yield_model::YieldModelResult;

/// Crop, climate and management values of one cell under one scenario.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CropDatum {
    crop_yield: Option<f64>,
    precip: Option<f64>,
    gdd: Option<f64>,
    climate_bin: Option<u32>,
    potential_yield: Option<f64>,
    mgmt_inputs: MgmtInputs,
    yield_model_result: YieldModelResult,
}

impl CropDatum {
    pub fn new(
        crop_yield: Option<f64>,
        precip: Option<f64>,
        gdd: Option<f64>,
        climate_bin: Option<u32>,
        potential_yield: Option<f64>,
        mgmt_inputs: MgmtInputs,
        yield_model_result: YieldModelResult,
    ) -> Self {
        Self {
            crop_yield,
            precip,
            gdd,
            climate_bin,
            potential_yield,
            mgmt_inputs,
            yield_model_result,
        }
    }

    /// Empirical yield (tons/ha) at baseline, projected yield in a scenario.
    pub fn yield_(&self) -> Option<f64> {
        self.crop_yield
    }

    pub fn precip(&self) -> Option<f64> {
        self.precip
    }

    pub fn gdd(&self) -> Option<f64> {
        self.gdd
    }

    pub fn climate_bin(&self) -> Option<u32> {
        self.climate_bin
    }

    pub fn potential_yield(&self) -> Option<f64> {
        self.potential_yield
    }

    pub fn mgmt_inputs(&self) -> &MgmtInputs {
        &self.mgmt_inputs
    }

    pub fn yield_model_result(&self) -> &YieldModelResult {
        &self.yield_model_result
    }

    pub fn modeled_yield(&self) -> Option<f64> {
        self.yield_model_result.modeled_yield()
    }

    pub fn mgmt_excess(&self) -> &MgmtInputs {
        self.yield_model_result.excess()
    }

    pub fn fertilizer_total(&self) -> Option<f64> {
        self.mgmt_inputs.fertilizer_total()
    }

    pub fn irrigation(&self) -> Option<f64> {
        self.mgmt_inputs.irrigation()
    }

    pub fn excess_fertilizer(&self) -> Option<f64> {
        self.mgmt_excess().fertilizer_total()
    }

    /// Modeled over empirical yield. Infinite when the empirical yield is
    /// zero, NaN for 0/0.
    pub fn model_bias(&self) -> Option<f64> {
        nullable::div(self.modeled_yield(), self.crop_yield)
    }
}

/// Baseline and scenario for one cell.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScenarioDatum {
    location: Location,
    area: Option<f64>,
    base: CropDatum,
    scenario: CropDatum,
    model_bias: Option<f64>,
}

impl ScenarioDatum {
    pub fn new(
        location: Location,
        area: Option<f64>,
        base: CropDatum,
        scenario: CropDatum,
        model_bias: Option<f64>,
    ) -> Self {
        Self {
            location,
            area,
            base,
            scenario,
            model_bias,
        }
    }

    /// Build a datum whose model bias is taken from the baseline.
    pub fn from_crop_data(
        location: Location,
        area: Option<f64>,
        base: CropDatum,
        scenario: CropDatum,
    ) -> Self {
        let model_bias = base.model_bias();
        Self::new(location, area, base, scenario, model_bias)
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Harvested area in hectares.
    pub fn area(&self) -> Option<f64> {
        self.area
    }

    pub fn base(&self) -> &CropDatum {
        &self.base
    }

    pub fn scenario(&self) -> &CropDatum {
        &self.scenario
    }

    pub fn model_bias(&self) -> Option<f64> {
        self.model_bias
    }

    pub fn yield_delta(&self) -> Option<f64> {
        nullable::sub(self.scenario.yield_(), self.base.yield_())
    }

    /// Scenario production in tons.
    pub fn production(&self) -> Option<f64> {
        nullable::mul(self.scenario.yield_(), self.area)
    }

    pub fn production_delta(&self) -> Option<f64> {
        nullable::mul(self.yield_delta(), self.area)
    }

    pub fn fertilizer_delta(&self) -> Option<f64> {
        nullable::sub(self.scenario.fertilizer_total(), self.base.fertilizer_total())
    }

    pub fn excess_fertilizer_delta(&self) -> Option<f64> {
        nullable::sub(self.scenario.excess_fertilizer(), self.base.excess_fertilizer())
    }

    pub fn base_applied(&self, component: MgmtComponent) -> Option<f64> {
        self.base.mgmt_inputs().get(component)
    }

    pub fn scenario_applied(&self, component: MgmtComponent) -> Option<f64> {
        self.scenario.mgmt_inputs().get(component)
    }

    pub fn base_excess(&self, component: MgmtComponent) -> Option<f64> {
        self.base.mgmt_excess().get(component)
    }

    pub fn scenario_excess(&self, component: MgmtComponent) -> Option<f64> {
        self.scenario.mgmt_excess().get(component)
    }
}
