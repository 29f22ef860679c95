//! Summary statistics over many scenario cells.
//!
//! Construction is a single pass over the cells. The running sums live in an
//! [`Accumulator`] whose `merge` is associative, so the same pass can be split
//! across threads with `rayon` and recombined.

use rayon::prelude::*;
use tracing::debug;

use crate::controls::ModelState;
use crate::datum::ScenarioDatum;
use crate::error::AggregateError;
use crate::mgmt::{MgmtComponent, MgmtInputs};
use crate::nullable::truthy;

/// Running counts and sums of an aggregation pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Accumulator {
    base_yield_count: usize,
    base_yield_total: f64,
    base_production_total: f64,
    incomplete_data_count: usize,
    area_total: f64,
    scenario_yield_count: usize,
    scenario_yield_total: f64,
    scenario_production_total: f64,
    unchanged_count: usize,
    increasing_count: usize,
    decreasing_count: usize,
    increasing_total: f64,
    decreasing_total: f64,
    fertilizer_total: f64,
    excess_fertilizer_total: f64,
    scenario_fertilizer_total: f64,
    scenario_excess_fertilizer: f64,
    base_mgmt_applied: MgmtInputs,
    base_mgmt_excess: MgmtInputs,
    scenario_mgmt_applied: MgmtInputs,
    scenario_mgmt_excess: MgmtInputs,
    cell_count: usize,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            base_yield_count: 0,
            base_yield_total: 0.0,
            base_production_total: 0.0,
            incomplete_data_count: 0,
            area_total: 0.0,
            scenario_yield_count: 0,
            scenario_yield_total: 0.0,
            scenario_production_total: 0.0,
            unchanged_count: 0,
            increasing_count: 0,
            decreasing_count: 0,
            increasing_total: 0.0,
            decreasing_total: 0.0,
            fertilizer_total: 0.0,
            excess_fertilizer_total: 0.0,
            scenario_fertilizer_total: 0.0,
            scenario_excess_fertilizer: 0.0,
            base_mgmt_applied: MgmtInputs::zeroed(),
            base_mgmt_excess: MgmtInputs::zeroed(),
            scenario_mgmt_applied: MgmtInputs::zeroed(),
            scenario_mgmt_excess: MgmtInputs::zeroed(),
            cell_count: 0,
        }
    }
}

impl Accumulator {
    /// Fold one cell into the sums. `index` only labels the error.
    pub fn push(
        &mut self,
        index: usize,
        cell: &ScenarioDatum,
        state: &ModelState,
    ) -> Result<(), AggregateError> {
        let base = cell.base();
        let scenario = cell.scenario();
        self.cell_count += 1;

        if is_incomplete(cell, state) {
            self.incomplete_data_count += 1;
        }

        let area = if truthy(cell.area()) {
            cell.area().unwrap_or(0.0)
        } else {
            0.0
        };
        if let Some(base_yield) = base.yield_() {
            self.base_yield_count += 1;
            self.base_yield_total += base_yield;
            self.area_total += area;
            self.base_production_total += base_yield * area;
        }
        if let Some(scenario_yield) = scenario.yield_() {
            self.scenario_yield_count += 1;
            self.scenario_yield_total += scenario_yield;
            self.scenario_production_total += scenario_yield * area;
        }
        if let Some(total) = base.fertilizer_total() {
            self.fertilizer_total += total;
        }
        if let Some(total) = base.excess_fertilizer() {
            self.excess_fertilizer_total += total;
        }
        if let Some(total) = scenario.fertilizer_total() {
            self.scenario_fertilizer_total += total;
        }
        if let Some(total) = scenario.excess_fertilizer() {
            self.scenario_excess_fertilizer += total;
        }

        for component in MgmtComponent::ALL {
            self.base_mgmt_applied
                .add_to(component, cell.base_applied(component));
            self.scenario_mgmt_applied
                .add_to(component, cell.scenario_applied(component));
            self.base_mgmt_excess
                .add_to(component, cell.base_excess(component));
            self.scenario_mgmt_excess
                .add_to(component, cell.scenario_excess(component));
        }

        if let Some(delta) = cell.yield_delta() {
            if delta == 0.0 {
                self.unchanged_count += 1;
            } else if delta > 0.0 {
                self.increasing_count += 1;
                self.increasing_total += delta;
            } else if delta < 0.0 {
                self.decreasing_count += 1;
                self.decreasing_total += delta;
            } else {
                return Err(AggregateError::NonNumericYieldDelta {
                    index,
                    location: cell.location(),
                });
            }
        }
        Ok(())
    }

    /// Combine the sums of two disjoint sets of cells.
    pub fn merge(&mut self, other: &Accumulator) {
        self.base_yield_count += other.base_yield_count;
        self.base_yield_total += other.base_yield_total;
        self.base_production_total += other.base_production_total;
        self.incomplete_data_count += other.incomplete_data_count;
        self.area_total += other.area_total;
        self.scenario_yield_count += other.scenario_yield_count;
        self.scenario_yield_total += other.scenario_yield_total;
        self.scenario_production_total += other.scenario_production_total;
        self.unchanged_count += other.unchanged_count;
        self.increasing_count += other.increasing_count;
        self.decreasing_count += other.decreasing_count;
        self.increasing_total += other.increasing_total;
        self.decreasing_total += other.decreasing_total;
        self.fertilizer_total += other.fertilizer_total;
        self.excess_fertilizer_total += other.excess_fertilizer_total;
        self.scenario_fertilizer_total += other.scenario_fertilizer_total;
        self.scenario_excess_fertilizer += other.scenario_excess_fertilizer;
        for component in MgmtComponent::ALL {
            self.base_mgmt_applied
                .add_to(component, other.base_mgmt_applied.get(component));
            self.base_mgmt_excess
                .add_to(component, other.base_mgmt_excess.get(component));
            self.scenario_mgmt_applied
                .add_to(component, other.scenario_mgmt_applied.get(component));
            self.scenario_mgmt_excess
                .add_to(component, other.scenario_mgmt_excess.get(component));
        }
        self.cell_count += other.cell_count;
    }

    /// Turn the sums into an aggregate. Management sums become per-cell
    /// averages over every cell pushed, with or without data.
    pub fn finish(mut self) -> ScenarioAggregate {
        if self.cell_count > 0 {
            let by_cell_count = 1.0 / self.cell_count as f64;
            self.base_mgmt_applied.scale(by_cell_count);
            self.base_mgmt_excess.scale(by_cell_count);
            self.scenario_mgmt_applied.scale(by_cell_count);
            self.scenario_mgmt_excess.scale(by_cell_count);
        }
        ScenarioAggregate { sums: self }
    }
}

/// A cell is incomplete when area and baseline yield disagree on presence,
/// or when it lacks management data the crop is expected to have.
fn is_incomplete(cell: &ScenarioDatum, state: &ModelState) -> bool {
    let base = cell.base();
    (cell.area().is_none() != base.yield_().is_none())
        || (state.has_fertilizer_data && base.fertilizer_total().is_none())
        || (state.has_irrigation_data && base.irrigation().is_none())
}

/// Aggregate statistics over a set of scenario cells.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioAggregate {
    sums: Accumulator,
}

impl ScenarioAggregate {
    /// Aggregate `data` in order.
    ///
    /// # Errors
    ///
    /// [`AggregateError::NonNumericYieldDelta`] on the first cell whose yield
    /// delta is NaN.
    pub fn from_data(data: &[ScenarioDatum], state: &ModelState) -> Result<Self, AggregateError> {
        let mut sums = Accumulator::default();
        for (index, cell) in data.iter().enumerate() {
            sums.push(index, cell, state)?;
        }
        debug!(cells = data.len(), "scenario aggregate built");
        Ok(sums.finish())
    }

    /// Aggregate `data` across the rayon thread pool. Counts match
    /// [`ScenarioAggregate::from_data`]; sums may differ in the last bits
    /// because addition order differs.
    pub fn par_from_data(
        data: &[ScenarioDatum],
        state: &ModelState,
    ) -> Result<Self, AggregateError> {
        let sums = data
            .par_iter()
            .enumerate()
            .try_fold(Accumulator::default, |mut sums, (index, cell)| {
                sums.push(index, cell, state)?;
                Ok(sums)
            })
            .try_reduce(Accumulator::default, |mut left, right| {
                left.merge(&right);
                Ok(left)
            })?;
        debug!(cells = data.len(), "scenario aggregate built in parallel");
        Ok(sums.finish())
    }

    pub fn cell_count(&self) -> usize {
        self.sums.cell_count
    }

    pub fn base_yield_count(&self) -> usize {
        self.sums.base_yield_count
    }

    pub fn scenario_yield_count(&self) -> usize {
        self.sums.scenario_yield_count
    }

    pub fn base_production_total(&self) -> f64 {
        self.sums.base_production_total
    }

    pub fn base_yield_average(&self) -> Option<f64> {
        average(self.sums.base_yield_total, self.sums.base_yield_count)
    }

    pub fn scenario_yield_average(&self) -> Option<f64> {
        average(self.sums.scenario_yield_total, self.sums.scenario_yield_count)
    }

    pub fn average_yield_change(&self) -> Option<f64> {
        Some(self.scenario_yield_average()? - self.base_yield_average()?)
    }

    /// Mean area over cells with a baseline yield.
    pub fn area_average(&self) -> Option<f64> {
        average(self.sums.area_total, self.sums.base_yield_count)
    }

    pub fn scenario_production_total(&self) -> Option<f64> {
        self.with_scenario(self.sums.scenario_production_total)
    }

    pub fn production_change(&self) -> Option<f64> {
        self.with_scenario(self.sums.scenario_production_total - self.sums.base_production_total)
    }

    pub fn increasing_count(&self) -> Option<usize> {
        self.with_scenario(self.sums.increasing_count)
    }

    pub fn decreasing_count(&self) -> Option<usize> {
        self.with_scenario(self.sums.decreasing_count)
    }

    pub fn unchanged_count(&self) -> usize {
        self.sums.unchanged_count
    }

    pub fn average_increase(&self) -> Option<f64> {
        average(self.sums.increasing_total, self.sums.increasing_count)
    }

    pub fn average_decrease(&self) -> Option<f64> {
        average(self.sums.decreasing_total, self.sums.decreasing_count)
    }

    pub fn incomplete_data_count(&self) -> usize {
        self.sums.incomplete_data_count
    }

    pub fn base_fertilizer(&self) -> f64 {
        self.sums.fertilizer_total
    }

    pub fn base_excess(&self) -> f64 {
        self.sums.excess_fertilizer_total
    }

    pub fn scenario_fertilizer(&self) -> f64 {
        self.sums.scenario_fertilizer_total
    }

    pub fn scenario_excess(&self) -> f64 {
        self.sums.scenario_excess_fertilizer
    }

    pub fn base_mgmt_applied(&self) -> &MgmtInputs {
        &self.sums.base_mgmt_applied
    }

    pub fn base_mgmt_excess(&self) -> &MgmtInputs {
        &self.sums.base_mgmt_excess
    }

    pub fn scenario_mgmt_applied(&self) -> &MgmtInputs {
        &self.sums.scenario_mgmt_applied
    }

    pub fn scenario_mgmt_excess(&self) -> &MgmtInputs {
        &self.sums.scenario_mgmt_excess
    }

    fn with_scenario<T>(&self, value: T) -> Option<T> {
        (self.sums.scenario_yield_count > 0).then_some(value)
    }
}

fn average(total: f64, count: usize) -> Option<f64> {
    (count > 0).then(|| total / count as f64)
}
