//! Diminishing-returns yield model driven by management inputs.
//!
//! Every nutrient and irrigation input acts as a limiting factor: the input
//! level needed for potential yield comes from the bin's coefficients, each
//! input satisfies some fraction of that need, and the scarcest input gates
//! the yield between the bin's minimum and potential.

use serde::Serialize;

use crate::error::TableError;
use crate::mgmt::{MgmtComponent, MgmtInputs};
use crate::nullable::{self, lift2, max_nan, min_nan};
use crate::tables::yield_model::{
    CoefficientRow, B_NUT, C_IRR, C_K2O, C_N, C_P2O5, MINIMUM_YIELD, POTENTIAL_YIELD,
};
use crate::tables::YieldModelTable;

/// Scale from model coefficients to real-world application rates, in
/// N, P, K, I order.
pub const SCALE_FACTOR: [f64; 4] = [10_000.0, 5_000.0, 3_000.0, 10.0];

/// Fraction of potential above which extra waste accrues.
pub const HIGH_YIELD_THRESHOLD: f64 = 0.7;

/// Share of the needed input wasted per unit of fraction above the threshold.
pub const HIGH_YIELD_WASTE_RATE: f64 = 0.2;

/// Nitrogen response coefficient used when the bin has no usable `c_N`.
pub const DEFAULT_C_N: f64 = 0.008321;

/// Phosphorus response coefficient used when the bin has no usable `c_P2O5`.
pub const DEFAULT_C_P2O5: f64 = 0.02957;

/// Stand-in response for potassium and irrigation in the simplified model,
/// large enough never to be the minimum.
const UNMODELED_RESPONSE: f64 = 50_000.0;

/// Modeled yield (tons/ha) and the inputs expected to be wasted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct YieldModelResult {
    modeled_yield: Option<f64>,
    excess: MgmtInputs,
}

impl YieldModelResult {
    pub fn new(modeled_yield: Option<f64>, excess: MgmtInputs) -> Self {
        Self {
            modeled_yield,
            excess,
        }
    }

    pub fn modeled_yield(&self) -> Option<f64> {
        self.modeled_yield
    }

    pub fn excess(&self) -> &MgmtInputs {
        &self.excess
    }
}

/// Yield achievable for a target, the inputs it requires, and the waste of
/// the inputs currently applied.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct InverseYieldModelResult {
    achieved_yield: Option<f64>,
    required: MgmtInputs,
    excess: MgmtInputs,
}

impl InverseYieldModelResult {
    pub fn achieved_yield(&self) -> Option<f64> {
        self.achieved_yield
    }

    pub fn required(&self) -> &MgmtInputs {
        &self.required
    }

    pub fn excess(&self) -> &MgmtInputs {
        &self.excess
    }
}

/// Yield model over one crop's coefficient table.
#[derive(Clone, Copy, Debug)]
pub struct YieldModel<'a> {
    table: &'a YieldModelTable,
}

impl<'a> YieldModel<'a> {
    pub fn new(table: &'a YieldModelTable) -> Self {
        Self { table }
    }

    /// Modeled yield and excess for `inputs` in `climate_bin`.
    pub fn forward(
        &self,
        climate_bin: Option<u32>,
        inputs: &MgmtInputs,
    ) -> Result<YieldModelResult, TableError> {
        let row = self.table.row(climate_bin);
        let needed = input_for_potential_yield(&row)?;
        let frac_of_potential = limiting_fraction(inputs, &needed);

        let min_yield = row.get(MINIMUM_YIELD)?;
        let potential_yield = row.get(POTENTIAL_YIELD)?;
        let span = nullable::sub(potential_yield, min_yield);
        let modeled_yield = nullable::add(min_yield, nullable::mul(span, frac_of_potential));
        let excess = excess_inputs(inputs, frac_of_potential, &needed);

        Ok(YieldModelResult::new(modeled_yield, excess))
    }

    /// Fast yield estimate for a change from `base_inputs` to `new_inputs`.
    ///
    /// Uses a saturating response `1 - b_nut * exp(-c * x)` for nitrogen and
    /// phosphorus only; potassium and irrigation do not limit the result.
    /// The change in response is scaled by the bin's potential yield and added
    /// to `observed_yield`. Excess is not modeled and comes back empty.
    pub fn forward_simplified(
        &self,
        climate_bin: Option<u32>,
        base_inputs: &MgmtInputs,
        new_inputs: &MgmtInputs,
        observed_yield: Option<f64>,
    ) -> Result<YieldModelResult, TableError> {
        let row = self.table.row(climate_bin);
        let potential_yield = row.get(POTENTIAL_YIELD)?;
        let c_n = calibrated(row.get(C_N)?, DEFAULT_C_N);
        let c_p = calibrated(row.get(C_P2O5)?, DEFAULT_C_P2O5);
        let b_nut = row.get(B_NUT)?;

        let current = nutrient_response(base_inputs, b_nut, c_n, c_p);
        let scenario = nutrient_response(new_inputs, b_nut, c_n, c_p);
        let change = nullable::sub(scenario, current)
            .filter(|change| !change.is_nan())
            .unwrap_or(0.0);

        let modeled_yield =
            nullable::add(observed_yield, nullable::mul(potential_yield, Some(change)));
        Ok(YieldModelResult::new(modeled_yield, MgmtInputs::EMPTY))
    }

    /// Inputs required to reach `target_yield` in `climate_bin`, capped at the
    /// bin's potential yield.
    pub fn inverse(
        &self,
        climate_bin: Option<u32>,
        target_yield: f64,
        current_inputs: &MgmtInputs,
    ) -> Result<InverseYieldModelResult, TableError> {
        let row = self.table.row(climate_bin);
        let potential_yield = row.get(POTENTIAL_YIELD)?;
        let frac_of_potential =
            potential_yield.map(|potential| min_nan(1.0, target_yield / potential));
        let achieved_yield = nullable::mul(potential_yield, frac_of_potential);

        let needed = input_for_potential_yield(&row)?;
        let mut required = MgmtInputs::EMPTY;
        for component in MgmtComponent::ALL {
            required.set(
                component,
                nullable::mul(needed.get(component), frac_of_potential),
            );
        }
        let excess = excess_inputs(current_inputs, frac_of_potential, &needed);

        Ok(InverseYieldModelResult {
            achieved_yield,
            required,
            excess,
        })
    }
}

/// Input levels that reach potential yield in the row's climate bin.
fn input_for_potential_yield(row: &CoefficientRow<'_>) -> Result<MgmtInputs, TableError> {
    let coefficients = [
        row.get(C_N)?,
        row.get(C_P2O5)?,
        row.get(C_K2O)?,
        row.get(C_IRR)?,
    ];
    let mut needed = [None; 4];
    for (slot, (coefficient, scale)) in needed
        .iter_mut()
        .zip(coefficients.into_iter().zip(SCALE_FACTOR))
    {
        *slot = coefficient.map(|c| c * scale);
    }
    Ok(MgmtInputs::new(needed))
}

/// Fraction of potential yield allowed by the scarcest input.
fn limiting_fraction(applied: &MgmtInputs, needed: &MgmtInputs) -> Option<f64> {
    let mut frac_of_potential = Some(1.0);
    for component in MgmtComponent::ALL {
        let fraction = match needed.get(component) {
            Some(need) if need > 0.0 => applied
                .get(component)
                .map(|have| min_nan(1.0, have / need)),
            // Nothing needed: this input never limits.
            Some(_) => Some(1.0),
            None => None,
        };
        frac_of_potential = lift2(frac_of_potential, fraction, min_nan);
    }
    frac_of_potential
}

/// Inputs applied beyond the need for potential yield, plus a small share of
/// the need once yield is in the top of its range.
fn excess_inputs(
    applied: &MgmtInputs,
    frac_of_potential: Option<f64>,
    needed: &MgmtInputs,
) -> MgmtInputs {
    let mut excess = MgmtInputs::EMPTY;
    for component in MgmtComponent::ALL {
        let need = needed.get(component);
        let overuse = lift2(applied.get(component), need, |have, need| {
            max_nan(0.0, have - need)
        });
        let high_yield = lift2(frac_of_potential, need, |frac, need| {
            max_nan(0.0, frac - HIGH_YIELD_THRESHOLD) * HIGH_YIELD_WASTE_RATE * need
        });
        excess.set(component, nullable::add(overuse, high_yield));
    }
    excess
}

fn calibrated(coefficient: Option<f64>, default: f64) -> f64 {
    match coefficient {
        None => default,
        Some(c) if c <= 0.0 => default,
        Some(c) => c,
    }
}

fn nutrient_response(
    inputs: &MgmtInputs,
    b_nut: Option<f64>,
    c_n: f64,
    c_p: f64,
) -> Option<f64> {
    let response =
        |amount: Option<f64>, c: f64| lift2(b_nut, amount, |b, x| 1.0 - b * (-c * x).exp());
    let nitrogen = response(inputs.nitrogen(), c_n);
    let phosphorus = response(inputs.phosphorus(), c_p);
    lift2(nitrogen, phosphorus, min_nan).map(|limit| min_nan(UNMODELED_RESPONSE, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    /// Needs 100 N, 50 P, 30 K and 10 irrigation for potential yield.
    fn table(c_k2o: f64) -> YieldModelTable {
        serde_json::from_value(json!([
            ["climate_bin", "potential_yield_tons_per_ha", "minimum_yield_tons_per_ha",
             "b_nut", "c_N", "c_P2O5", "c_K2O", "b_irr", "c_irr"],
            [0, 10.0, 2.0, 1.0, 0.01, 0.01, c_k2o, 1.0, 1.0],
            [1, 10.0, 3.0, 1.0, null, -2.0, 0.01, 1.0, 1.0]
        ]))
        .unwrap()
    }

    #[test]
    fn scarcest_input_limits_yield() {
        let table = table(0.01);
        let model = YieldModel::new(&table);
        let inputs = MgmtInputs::from([50.0, 50.0, 30.0, 10.0]);
        let result = model.forward(Some(0), &inputs).unwrap();
        // N covers half its need, so yield sits halfway between 2 and 10.
        assert!(close(result.modeled_yield(), 6.0));
        for component in MgmtComponent::ALL {
            assert!(close(result.excess().get(component), 0.0));
        }
    }

    #[test]
    fn excess_counts_overuse_and_high_yield_waste() {
        let table = table(0.01);
        let model = YieldModel::new(&table);
        let inputs = MgmtInputs::from([200.0, 50.0, 30.0, 10.0]);
        let result = model.forward(Some(0), &inputs).unwrap();
        assert!(close(result.modeled_yield(), 10.0));
        assert!(close(result.excess().nitrogen(), 100.0 + 0.3 * 0.2 * 100.0));
        assert!(close(result.excess().phosphorus(), 0.3 * 0.2 * 50.0));
        assert!(close(result.excess().potassium(), 0.3 * 0.2 * 30.0));
        assert!(close(result.excess().irrigation(), 0.3 * 0.2 * 10.0));
    }

    #[test]
    fn zero_need_never_limits() {
        let table = table(0.0);
        let model = YieldModel::new(&table);
        let inputs = MgmtInputs::from([100.0, 50.0, 0.0, 10.0]);
        let result = model.forward(Some(0), &inputs).unwrap();
        assert!(close(result.modeled_yield(), 10.0));
    }

    #[test]
    fn unknown_input_gives_unknown_yield() {
        let table = table(0.01);
        let model = YieldModel::new(&table);
        let inputs = MgmtInputs::new([Some(100.0), None, Some(30.0), Some(10.0)]);
        let result = model.forward(Some(0), &inputs).unwrap();
        assert_eq!(result.modeled_yield(), None);
        assert_eq!(result.excess().phosphorus(), None);
        assert!(result.excess().nitrogen().is_some());
    }

    #[test]
    fn nan_input_propagates() {
        let table = table(0.01);
        let model = YieldModel::new(&table);
        let inputs = MgmtInputs::from([f64::NAN, 50.0, 30.0, 10.0]);
        let result = model.forward(Some(0), &inputs).unwrap();
        assert!(result.modeled_yield().is_some_and(f64::is_nan));
    }

    #[test]
    fn missing_column_is_fatal() {
        let table: YieldModelTable =
            serde_json::from_value(json!([["climate_bin", "c_N"], [0, 0.01]])).unwrap();
        let model = YieldModel::new(&table);
        let err = model
            .forward(Some(0), &MgmtInputs::from([1.0, 1.0, 1.0, 1.0]))
            .unwrap_err();
        assert_eq!(err, TableError::ColumnNotFound(C_P2O5.to_string()));
    }

    #[test]
    fn simplified_model_falls_back_to_calibrated_coefficients() {
        let table = table(0.01);
        let model = YieldModel::new(&table);
        let base = MgmtInputs::from([0.0, 0.0, 0.0, 0.0]);

        // Bin 1 has no c_N and a negative c_P2O5.
        let nitrogen_limited = MgmtInputs::from([100.0, 1_000.0, 0.0, 0.0]);
        let result = model
            .forward_simplified(Some(1), &base, &nitrogen_limited, Some(3.0))
            .unwrap();
        let expected = 3.0 + 10.0 * (1.0 - (-0.008321f64 * 100.0).exp());
        assert!(close(result.modeled_yield(), expected));
        assert_eq!(*result.excess(), MgmtInputs::EMPTY);

        let phosphorus_limited = MgmtInputs::from([1_000.0, 10.0, 0.0, 0.0]);
        let result = model
            .forward_simplified(Some(1), &base, &phosphorus_limited, Some(3.0))
            .unwrap();
        let expected = 3.0 + 10.0 * (1.0 - (-0.02957f64 * 10.0).exp());
        assert!(close(result.modeled_yield(), expected));
    }

    #[test]
    fn simplified_model_ignores_potassium_and_irrigation() {
        let table = table(0.01);
        let model = YieldModel::new(&table);
        let base = MgmtInputs::from([80.0, 40.0, 0.0, 0.0]);
        let more_k = MgmtInputs::from([80.0, 40.0, 500.0, 1.0]);
        let result = model
            .forward_simplified(Some(0), &base, &more_k, Some(4.5))
            .unwrap();
        assert!(close(result.modeled_yield(), 4.5));
    }

    #[test]
    fn simplified_model_treats_unknown_change_as_no_change() {
        let table = table(0.01);
        let model = YieldModel::new(&table);
        let base = MgmtInputs::new([None, Some(10.0), None, None]);
        let scenario = MgmtInputs::from([120.0, 10.0, 0.0, 0.0]);
        let result = model
            .forward_simplified(Some(0), &base, &scenario, Some(4.0))
            .unwrap();
        assert!(close(result.modeled_yield(), 4.0));
    }

    #[test]
    fn inverse_scales_requirements_to_target() {
        let table = table(0.01);
        let model = YieldModel::new(&table);
        let applied = MgmtInputs::from([80.0, 50.0, 30.0, 0.0]);
        let result = model.inverse(Some(0), 5.0, &applied).unwrap();
        assert!(close(result.achieved_yield(), 5.0));
        assert!(close(result.required().nitrogen(), 50.0));
        assert!(close(result.required().phosphorus(), 25.0));
        assert!(close(result.required().potassium(), 15.0));
        assert!(close(result.required().irrigation(), 5.0));
        // Waste is measured against the full potential requirement.
        assert!(close(result.excess().nitrogen(), 0.0));
    }

    #[test]
    fn inverse_caps_at_potential() {
        let table = table(0.01);
        let model = YieldModel::new(&table);
        let applied = MgmtInputs::from([150.0, 50.0, 30.0, 10.0]);
        let result = model.inverse(Some(0), 25.0, &applied).unwrap();
        assert!(close(result.achieved_yield(), 10.0));
        assert!(close(result.required().nitrogen(), 100.0));
        assert!(close(result.excess().nitrogen(), 50.0 + 0.3 * 0.2 * 100.0));
    }
}
