use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{number, ColumnData};
use crate::error::TableError;

pub const CLIMATE_BIN: &str = "climate_bin";
pub const POTENTIAL_YIELD: &str = "potential_yield_tons_per_ha";
pub const MINIMUM_YIELD: &str = "minimum_yield_tons_per_ha";
pub const B_NUT: &str = "b_nut";
pub const C_N: &str = "c_N";
pub const C_P2O5: &str = "c_P2O5";
pub const C_K2O: &str = "c_K2O";
pub const B_IRR: &str = "b_irr";
pub const C_IRR: &str = "c_irr";

/// Per-climate-bin yield model coefficients.
///
/// The row for bin `b` sits at offset `b + 1`, directly after the header row.
/// Columns are located by header name on every read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YieldModelTable {
    data: ColumnData,
}

impl YieldModelTable {
    pub fn from_column_data(data: ColumnData) -> Self {
        Self { data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn column_data(&self) -> &ColumnData {
        &self.data
    }

    /// Cell in the row for `climate_bin` and the named column.
    ///
    /// An empty table, a missing bin, or a row too short for the column reads
    /// as `None`. An unknown column name is an error.
    pub fn cell(
        &self,
        climate_bin: Option<u32>,
        column: &str,
    ) -> Result<Option<f64>, TableError> {
        self.row(climate_bin).get(column)
    }

    /// Reader over the coefficient row for one climate bin.
    pub fn row(&self, climate_bin: Option<u32>) -> CoefficientRow<'_> {
        let cells = climate_bin.and_then(|bin| self.data.row(bin as usize + 1));
        CoefficientRow { table: self, cells }
    }
}

/// Coefficients for a single climate bin.
#[derive(Clone, Copy, Debug)]
pub struct CoefficientRow<'a> {
    table: &'a YieldModelTable,
    cells: Option<&'a [Value]>,
}

impl CoefficientRow<'_> {
    pub fn get(&self, column: &str) -> Result<Option<f64>, TableError> {
        if self.table.is_empty() {
            return Ok(None);
        }
        let index = self.table.data.column_index(column)?;
        Ok(number(self.cells.and_then(|cells| cells.get(index))))
    }
}
