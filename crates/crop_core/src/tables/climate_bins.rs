use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{number, ColumnData};
use crate::error::TableError;

/// Maximum number of climate definition rows kept from the data source.
pub const CLIMATE_DEFS_ROW_LIMIT: usize = 30_000;

pub const BIN_NUMBER: &str = "bin_number";
pub const GDD_MIN: &str = "gdd_min_temp_c";
pub const GDD_MAX: &str = "gdd_max_temp_c";
pub const PRECIP_MIN: &str = "precip_min_mm";
pub const PRECIP_MAX: &str = "precip_max_mm";
pub const POTENTIAL_YIELD: &str = "potential_yield_tons_per_ha";
pub const CROP_NAME: &str = "crop_name";

/// Climate bin definition: the precipitation and growing-degree-day ranges a
/// bin covers for one crop, and the potential yield in that bin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClimateBin {
    pub bin_number: u32,
    pub crop_name: String,
    pub gdd_min: Option<f64>,
    pub gdd_max: Option<f64>,
    pub precip_min: Option<f64>,
    pub precip_max: Option<f64>,
    pub potential_yield: Option<f64>,
}

impl ClimateBin {
    fn encloses(&self, precip: f64, gdd: f64) -> bool {
        within(self.precip_min, self.precip_max, precip)
            && within(self.gdd_min, self.gdd_max, gdd)
    }
}

fn within(min: Option<f64>, max: Option<f64>, value: f64) -> bool {
    matches!((min, max), (Some(min), Some(max)) if min <= value && value <= max)
}

/// Climate bins in source order. Lookups are linear scans and the first match
/// wins, so overlapping definitions resolve by table order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClimateBinTable {
    bins: Vec<ClimateBin>,
}

impl ClimateBinTable {
    pub fn new(bins: Vec<ClimateBin>) -> Self {
        Self { bins }
    }

    /// Build the table from climate definition column data.
    ///
    /// Rows without a bin number or crop name cannot be matched and are
    /// dropped. At most [`CLIMATE_DEFS_ROW_LIMIT`] rows are read.
    pub fn from_column_data(data: &ColumnData) -> Result<Self, TableError> {
        if data.is_empty() {
            return Ok(Self::default());
        }
        let bin_col = data.column_index(BIN_NUMBER)?;
        let gdd_min_col = data.column_index(GDD_MIN)?;
        let gdd_max_col = data.column_index(GDD_MAX)?;
        let precip_min_col = data.column_index(PRECIP_MIN)?;
        let precip_max_col = data.column_index(PRECIP_MAX)?;
        let potential_col = data.column_index(POTENTIAL_YIELD)?;
        let crop_col = data.column_index(CROP_NAME)?;

        let mut bins = Vec::new();
        let mut skipped = 0usize;
        for row in data.data_rows().iter().take(CLIMATE_DEFS_ROW_LIMIT) {
            let bin_number = number(row.get(bin_col)).filter(|value| {
                value.fract() == 0.0 && *value >= 0.0 && *value <= f64::from(u32::MAX)
            });
            let crop_name = row.get(crop_col).and_then(|cell| cell.as_str());
            let (Some(bin_number), Some(crop_name)) = (bin_number, crop_name) else {
                skipped += 1;
                continue;
            };
            bins.push(ClimateBin {
                bin_number: bin_number as u32,
                crop_name: crop_name.to_string(),
                gdd_min: number(row.get(gdd_min_col)),
                gdd_max: number(row.get(gdd_max_col)),
                precip_min: number(row.get(precip_min_col)),
                precip_max: number(row.get(precip_max_col)),
                potential_yield: number(row.get(potential_col)),
            });
        }
        if skipped > 0 {
            warn!(skipped, "climate definitions without bin number or crop name");
        }
        debug!(bins = bins.len(), "climate bin table loaded");
        Ok(Self { bins })
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn bins(&self) -> &[ClimateBin] {
        &self.bins
    }

    /// First bin for `crop` whose ranges enclose `precip` and `gdd`.
    pub fn find_bin(&self, crop: &str, precip: f64, gdd: f64) -> Option<u32> {
        self.bins
            .iter()
            .find(|bin| bin.crop_name == crop && bin.encloses(precip, gdd))
            .map(|bin| bin.bin_number)
    }

    /// Potential yield of the first row matching `crop` and `bin_number`.
    pub fn find_potential_yield(&self, crop: &str, bin_number: u32) -> Option<f64> {
        self.bins
            .iter()
            .find(|bin| bin.crop_name == crop && bin.bin_number == bin_number)
            .and_then(|bin| bin.potential_yield)
    }
}
