use serde::{Serialize, Serializer};
use serde_with::skip_serializing_none;

use crate::aggregate::ScenarioAggregate;
use crate::datum::ScenarioDatum;
use crate::mgmt::MgmtInputs;

/// Summary line of a scenario run.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AggregateReport {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub scenario: String,
    pub crop: String,
    pub cell_count: usize,
    pub base_yield_count: usize,
    pub scenario_yield_count: usize,
    pub incomplete_data_count: usize,
    pub unchanged_count: usize,
    pub increasing_count: Option<usize>,
    pub decreasing_count: Option<usize>,
    pub base_yield_average: Option<f64>,
    pub scenario_yield_average: Option<f64>,
    pub average_yield_change: Option<f64>,
    pub average_increase: Option<f64>,
    pub average_decrease: Option<f64>,
    pub area_average: Option<f64>,
    pub base_production_total: f64,
    pub scenario_production_total: Option<f64>,
    pub production_change: Option<f64>,
    pub base_fertilizer: f64,
    pub base_excess: f64,
    pub scenario_fertilizer: f64,
    pub scenario_excess: f64,
    pub base_mgmt_applied: MgmtInputs,
    pub base_mgmt_excess: MgmtInputs,
    pub scenario_mgmt_applied: MgmtInputs,
    pub scenario_mgmt_excess: MgmtInputs,
}

impl AggregateReport {
    pub fn new(scenario: &str, crop: &str, aggregate: &ScenarioAggregate) -> Self {
        Self {
            kind: "aggregate",
            scenario: scenario.to_string(),
            crop: crop.to_string(),
            cell_count: aggregate.cell_count(),
            base_yield_count: aggregate.base_yield_count(),
            scenario_yield_count: aggregate.scenario_yield_count(),
            incomplete_data_count: aggregate.incomplete_data_count(),
            unchanged_count: aggregate.unchanged_count(),
            increasing_count: aggregate.increasing_count(),
            decreasing_count: aggregate.decreasing_count(),
            base_yield_average: aggregate.base_yield_average(),
            scenario_yield_average: aggregate.scenario_yield_average(),
            average_yield_change: aggregate.average_yield_change(),
            average_increase: aggregate.average_increase(),
            average_decrease: aggregate.average_decrease(),
            area_average: aggregate.area_average(),
            base_production_total: aggregate.base_production_total(),
            scenario_production_total: aggregate.scenario_production_total(),
            production_change: aggregate.production_change(),
            base_fertilizer: aggregate.base_fertilizer(),
            base_excess: aggregate.base_excess(),
            scenario_fertilizer: aggregate.scenario_fertilizer(),
            scenario_excess: aggregate.scenario_excess(),
            base_mgmt_applied: *aggregate.base_mgmt_applied(),
            base_mgmt_excess: *aggregate.base_mgmt_excess(),
            scenario_mgmt_applied: *aggregate.scenario_mgmt_applied(),
            scenario_mgmt_excess: *aggregate.scenario_mgmt_excess(),
        }
    }

    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }
}

/// One computed cell. NaN and infinite values serialize as `null`, except
/// `model_bias`, which writes them as the strings `NaN`, `Infinity` and
/// `-Infinity` so an infinite bias stays distinct from an unknown one.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CellRecord {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub lat: f64,
    pub lng: f64,
    pub area: Option<f64>,
    pub base_yield: Option<f64>,
    pub modeled_base_yield: Option<f64>,
    pub scenario_yield: Option<f64>,
    pub yield_delta: Option<f64>,
    pub production: Option<f64>,
    pub production_delta: Option<f64>,
    #[serde(serialize_with = "non_finite_as_string")]
    pub model_bias: Option<f64>,
    pub base_bin: Option<u32>,
    pub scenario_bin: Option<u32>,
    pub scenario_precip: Option<f64>,
    pub fertilizer_delta: Option<f64>,
    pub excess_fertilizer_delta: Option<f64>,
    pub scenario_applied: MgmtInputs,
    pub scenario_excess: MgmtInputs,
}

impl CellRecord {
    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }
}

fn non_finite_as_string<S: Serializer>(
    value: &Option<f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match *value {
        Some(v) if v.is_nan() => serializer.serialize_str("NaN"),
        Some(v) if v == f64::INFINITY => serializer.serialize_str("Infinity"),
        Some(v) if v == f64::NEG_INFINITY => serializer.serialize_str("-Infinity"),
        Some(v) => serializer.serialize_f64(v),
        None => serializer.serialize_none(),
    }
}

impl From<&ScenarioDatum> for CellRecord {
    fn from(cell: &ScenarioDatum) -> Self {
        let location = cell.location();
        let base = cell.base();
        let scenario = cell.scenario();
        Self {
            kind: "cell",
            lat: location.lat,
            lng: location.lng,
            area: cell.area(),
            base_yield: base.yield_(),
            modeled_base_yield: base.modeled_yield(),
            scenario_yield: scenario.yield_(),
            yield_delta: cell.yield_delta(),
            production: cell.production(),
            production_delta: cell.production_delta(),
            model_bias: cell.model_bias(),
            base_bin: base.climate_bin(),
            scenario_bin: scenario.climate_bin(),
            scenario_precip: scenario.precip(),
            fertilizer_delta: cell.fertilizer_delta(),
            excess_fertilizer_delta: cell.excess_fertilizer_delta(),
            scenario_applied: *scenario.mgmt_inputs(),
            scenario_excess: *scenario.mgmt_excess(),
        }
    }
}
