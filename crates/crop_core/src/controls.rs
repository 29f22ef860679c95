//! Scenario controls, their persisted form, and the derived model state.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::catalog::{CropCatalog, GDD_FIELD_INDEX_MAX, GDD_FIELD_INDEX_MIN};
use crate::error::SanityError;
use crate::mgmt::MgmtInputs;

pub const DEFAULT_CROP: &str = "maize";

/// Level at which crops are modeled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    World,
    Local,
}

/// The scenario being modeled: which crop, and how climate and management
/// differ from the baseline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelControls {
    pub crop: String,
    /// Precipitation change in percent.
    pub precip_change: f64,
    /// Temperature change in °C.
    pub temp_change: f64,
    /// Known components replace the baseline inputs of every cell.
    pub mgmt_overrides: MgmtInputs,
    pub granularity: Granularity,
}

impl ModelControls {
    pub fn new<S: Into<String>>(crop: S) -> Self {
        Self {
            crop: crop.into(),
            precip_change: 0.0,
            temp_change: 0.0,
            mgmt_overrides: MgmtInputs::EMPTY,
            granularity: Granularity::default(),
        }
    }

    pub fn clear_overrides(&mut self) {
        self.mgmt_overrides = MgmtInputs::EMPTY;
    }

    pub fn current_state(&self) -> ControlsState {
        ControlsState {
            active_crop: Some(self.crop.clone()),
            precip_change: Some(self.precip_change),
            temp_change: Some(self.temp_change),
            mgmt_overrides: Some(self.mgmt_overrides),
            granularity: Some(self.granularity),
        }
    }

    /// Apply a persisted state. Absent keys leave the current value alone.
    pub fn set_current_state(&mut self, state: &ControlsState) {
        if let Some(crop) = &state.active_crop {
            self.crop.clone_from(crop);
        }
        if let Some(change) = state.precip_change {
            self.precip_change = change;
        }
        if let Some(change) = state.temp_change {
            self.temp_change = change;
        }
        if let Some(overrides) = state.mgmt_overrides {
            self.mgmt_overrides = overrides;
        }
        if let Some(granularity) = state.granularity {
            self.granularity = granularity;
        }
    }
}

impl Default for ModelControls {
    fn default() -> Self {
        Self::new(DEFAULT_CROP)
    }
}

/// Persisted form of [`ModelControls`].
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlsState {
    #[serde(default)]
    pub active_crop: Option<String>,
    #[serde(default)]
    pub precip_change: Option<f64>,
    #[serde(default)]
    pub temp_change: Option<f64>,
    #[serde(default)]
    pub mgmt_overrides: Option<MgmtInputs>,
    #[serde(default)]
    pub granularity: Option<Granularity>,
}

/// Top-level persisted document of a crop model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub model_controls: Option<ControlsState>,
}

/// What data is available for the selected crop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelState {
    pub has_fertilizer_data: bool,
    pub has_irrigation_data: bool,
    pub has_yield_model: bool,
}

impl ModelState {
    /// The full yield model runs only with both coefficients and fertilizer
    /// inputs available.
    pub fn can_run_yield_model(&self) -> bool {
        self.has_yield_model && self.has_fertilizer_data
    }
}

/// Check that `controls` stay within the range the data covers.
pub fn check_scenario_sanity(
    controls: &ModelControls,
    catalog: &CropCatalog,
) -> Result<(), SanityError> {
    if controls.temp_change.is_nan() {
        return Err(SanityError::TemperatureNotANumber);
    }
    if controls.precip_change.is_nan() {
        return Err(SanityError::PrecipitationNotANumber);
    }
    let gdd_index = catalog
        .gdd_index(&controls.crop, controls.temp_change)
        .map_err(|_| SanityError::UnknownCrop(controls.crop.clone()))?;
    if !(GDD_FIELD_INDEX_MIN..=GDD_FIELD_INDEX_MAX).contains(&gdd_index) {
        return Err(SanityError::TemperatureOutOfRange { gdd_index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_model_maize_without_overrides() {
        let controls = ModelControls::default();
        assert_eq!(controls.crop, "maize");
        assert_eq!(controls.mgmt_overrides, MgmtInputs::EMPTY);
        assert_eq!(controls.granularity, Granularity::World);
    }

    #[test]
    fn clear_overrides_forgets_every_component() {
        let mut controls = ModelControls::default();
        controls.mgmt_overrides = MgmtInputs::from([1.0, 2.0, 3.0, 0.5]);
        controls.clear_overrides();
        assert_eq!(controls.mgmt_overrides, MgmtInputs::EMPTY);
    }

    #[test]
    fn persisted_state_uses_stable_keys() {
        let mut controls = ModelControls::new("rice");
        controls.precip_change = -10.0;
        controls.mgmt_overrides = MgmtInputs::new([Some(120.0), None, None, None]);
        let value = serde_json::to_value(controls.current_state()).unwrap();
        assert_eq!(
            value,
            json!({
                "active_crop": "rice",
                "precip_change": -10.0,
                "temp_change": 0.0,
                "mgmt_overrides": [120.0, null, null, null],
                "granularity": "world"
            })
        );
    }

    #[test]
    fn absent_keys_keep_current_values() {
        let mut controls = ModelControls::new("rice");
        controls.temp_change = 1.5;
        let state: ControlsState =
            serde_json::from_value(json!({"precip_change": 0.0, "granularity": "local"})).unwrap();
        controls.set_current_state(&state);
        assert_eq!(controls.crop, "rice");
        assert_eq!(controls.temp_change, 1.5);
        assert_eq!(controls.precip_change, 0.0);
        assert_eq!(controls.granularity, Granularity::Local);
    }

    #[test]
    fn sanity_rejects_unparseable_changes() {
        let catalog = CropCatalog::builtin();
        let mut controls = ModelControls::default();
        controls.temp_change = f64::NAN;
        assert_eq!(
            check_scenario_sanity(&controls, &catalog),
            Err(SanityError::TemperatureNotANumber)
        );
        controls.temp_change = 0.0;
        controls.precip_change = f64::NAN;
        assert_eq!(
            check_scenario_sanity(&controls, &catalog),
            Err(SanityError::PrecipitationNotANumber)
        );
    }

    #[test]
    fn sanity_bounds_the_gdd_field_index() {
        let catalog = CropCatalog::builtin();
        let mut controls = ModelControls::default();
        for temp_change in [-4.0, 0.0, 8.0] {
            controls.temp_change = temp_change;
            assert_eq!(check_scenario_sanity(&controls, &catalog), Ok(()));
        }
        controls.temp_change = 9.0;
        assert_eq!(
            check_scenario_sanity(&controls, &catalog),
            Err(SanityError::TemperatureOutOfRange { gdd_index: -1.0 })
        );
        controls.temp_change = -5.0;
        assert_eq!(
            check_scenario_sanity(&controls, &catalog),
            Err(SanityError::TemperatureOutOfRange { gdd_index: 13.0 })
        );
    }

    #[test]
    fn sanity_rejects_unknown_crops() {
        let controls = ModelControls::new("barley");
        assert_eq!(
            check_scenario_sanity(&controls, &CropCatalog::builtin()),
            Err(SanityError::UnknownCrop("barley".to_string()))
        );
    }

    #[test]
    fn controls_serialize_only_modeled_fields() {
        let value = serde_json::to_value(ModelControls::default()).unwrap();
        let mut keys: Vec<&str> = value
            .as_object()
            .expect("controls are an object")
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["crop", "granularity", "mgmt_overrides", "precip_change", "temp_change"]
        );
    }
}
