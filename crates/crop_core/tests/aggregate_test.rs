use proptest::prelude::*;

use crop_core::aggregate::ScenarioAggregate;
use crop_core::controls::ModelState;
use crop_core::datum::{CropDatum, ScenarioDatum};
use crop_core::error::AggregateError;
use crop_core::layers::Location;
use crop_core::mgmt::MgmtInputs;
use crop_core::yield_model::YieldModelResult;

fn datum(crop_yield: Option<f64>) -> CropDatum {
    CropDatum::new(
        crop_yield,
        None,
        None,
        None,
        None,
        MgmtInputs::EMPTY,
        YieldModelResult::new(crop_yield, MgmtInputs::EMPTY),
    )
}

fn cell(
    index: usize,
    area: Option<f64>,
    base: Option<f64>,
    scenario: Option<f64>,
) -> ScenarioDatum {
    let location = Location::new(index as f64, 0.0);
    ScenarioDatum::from_crop_data(location, area, datum(base), datum(scenario))
}

#[test]
fn averages_skip_missing_yields() {
    let cells = [
        cell(0, Some(1.0), Some(2.0), Some(2.0)),
        cell(1, Some(1.0), Some(4.0), Some(4.0)),
        cell(2, None, None, None),
    ];
    let aggregate = ScenarioAggregate::from_data(&cells, &ModelState::default()).unwrap();
    assert_eq!(aggregate.cell_count(), 3);
    assert_eq!(aggregate.base_yield_count(), 2);
    assert_eq!(aggregate.base_yield_average(), Some(3.0));
    assert_eq!(aggregate.unchanged_count(), 2);
    assert_eq!(aggregate.incomplete_data_count(), 0);
}

#[test]
fn yield_without_area_is_incomplete_and_produces_nothing() {
    let cells = [cell(0, None, Some(5.0), Some(6.0))];
    let aggregate = ScenarioAggregate::from_data(&cells, &ModelState::default()).unwrap();
    assert_eq!(aggregate.incomplete_data_count(), 1);
    assert_eq!(aggregate.base_production_total(), 0.0);
    assert_eq!(aggregate.increasing_count(), Some(1));
    assert_eq!(aggregate.average_increase(), Some(1.0));
}

#[test]
fn nan_yield_delta_names_the_cell() {
    let cells = [
        cell(0, Some(1.0), Some(2.0), Some(3.0)),
        cell(1, Some(1.0), Some(2.0), Some(f64::NAN)),
    ];
    let err = ScenarioAggregate::from_data(&cells, &ModelState::default()).unwrap_err();
    assert_eq!(
        err,
        AggregateError::NonNumericYieldDelta {
            index: 1,
            location: Location::new(1.0, 0.0),
        }
    );
    assert!(ScenarioAggregate::par_from_data(&cells, &ModelState::default()).is_err());
}

#[test]
fn empty_input_aggregates_to_zero() {
    let aggregate = ScenarioAggregate::from_data(&[], &ModelState::default()).unwrap();
    assert_eq!(aggregate.cell_count(), 0);
    assert_eq!(aggregate.base_yield_average(), None);
    assert_eq!(aggregate.scenario_production_total(), None);
    assert_eq!(aggregate.increasing_count(), None);
}

fn yields() -> impl Strategy<Value = Vec<(Option<f64>, Option<f64>, Option<f64>)>> {
    let value = prop::option::of(0.0f64..20.0);
    prop::collection::vec((prop::option::of(1.0f64..500.0), value.clone(), value), 0..40)
}

proptest! {
    #[test]
    fn delta_counts_partition_cells_with_both_yields(rows in yields()) {
        let cells: Vec<ScenarioDatum> = rows
            .iter()
            .enumerate()
            .map(|(index, &(area, base, scenario))| cell(index, area, base, scenario))
            .collect();
        let aggregate = ScenarioAggregate::from_data(&cells, &ModelState::default()).unwrap();
        let with_delta = rows.iter().filter(|(_, b, s)| b.is_some() && s.is_some()).count();
        let increasing = aggregate.increasing_count().unwrap_or(0);
        let decreasing = aggregate.decreasing_count().unwrap_or(0);
        prop_assert_eq!(increasing + decreasing + aggregate.unchanged_count(), with_delta);
        prop_assert!(aggregate.base_yield_count() <= aggregate.cell_count());
    }

    #[test]
    fn parallel_counts_match_sequential(rows in yields()) {
        let cells: Vec<ScenarioDatum> = rows
            .iter()
            .enumerate()
            .map(|(index, &(area, base, scenario))| cell(index, area, base, scenario))
            .collect();
        let state = ModelState::default();
        let sequential = ScenarioAggregate::from_data(&cells, &state).unwrap();
        let parallel = ScenarioAggregate::par_from_data(&cells, &state).unwrap();
        prop_assert_eq!(sequential.cell_count(), parallel.cell_count());
        prop_assert_eq!(sequential.base_yield_count(), parallel.base_yield_count());
        prop_assert_eq!(sequential.unchanged_count(), parallel.unchanged_count());
        prop_assert_eq!(sequential.increasing_count(), parallel.increasing_count());
        prop_assert_eq!(sequential.incomplete_data_count(), parallel.incomplete_data_count());
        let total_gap =
            (sequential.base_production_total() - parallel.base_production_total()).abs();
        prop_assert!(total_gap < 1e-6);
    }
}
