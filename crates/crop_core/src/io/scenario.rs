use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::catalog::CropCatalog;
use crate::controls::{ControlsState, ModelControls};
use crate::layers::{InMemoryLayers, LayerSource, Location};
use crate::model::ModelTables;
use crate::tables::{ClimateBinTable, ColumnData, YieldModelTable};

/// Scenario document: lookup tables, per-location layer data and the
/// controls to run with.
#[derive(Clone, Debug, Deserialize)]
pub struct ScenarioFile {
    pub name: String,
    #[serde(default)]
    pub controls: ControlsState,
    /// Crop catalog override. The builtin catalog is used when absent.
    #[serde(default)]
    pub crops: Option<CropCatalog>,
    pub climate_bins: ColumnData,
    /// Yield model coefficient tables keyed by crop name.
    #[serde(default)]
    pub yield_models: BTreeMap<String, YieldModelTable>,
    #[serde(default)]
    pub columns: Vec<FieldColumn>,
    /// Locations to compute. Every location found in `columns` when empty.
    #[serde(default)]
    pub locations: Vec<Location>,
}

/// Values of one table field.
#[derive(Clone, Debug, Deserialize)]
pub struct FieldColumn {
    pub table: String,
    pub field: String,
    pub cells: Vec<FieldCell>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct FieldCell {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub value: Option<f64>,
}

impl ScenarioFile {
    /// Load a scenario JSON document from disk.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open scenario file {:?}", path))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Deserialize and validate a scenario document from an arbitrary reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let scenario: Self = serde_json::from_reader(reader).context("invalid scenario json")?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.name.trim().is_empty(), "scenario name is empty");
        let mut seen = BTreeSet::new();
        for column in &self.columns {
            ensure!(
                seen.insert((column.table.as_str(), column.field.as_str())),
                "column {}/{} is listed twice",
                column.table,
                column.field
            );
        }
        for location in &self.locations {
            ensure!(
                location.lat.is_finite() && location.lng.is_finite(),
                "location {} is not finite",
                location
            );
        }
        Ok(())
    }

    /// Controls of the document applied over the defaults.
    pub fn model_controls(&self) -> ModelControls {
        let mut controls = ModelControls::default();
        controls.set_current_state(&self.controls);
        controls
    }

    pub fn model_tables(&self) -> Result<ModelTables> {
        let climate_bins = ClimateBinTable::from_column_data(&self.climate_bins)
            .with_context(|| format!("scenario {:?} has an unusable climate table", self.name))?;
        let crops = self.crops.clone().unwrap_or_else(CropCatalog::builtin);
        Ok(ModelTables::new(climate_bins, self.yield_models.clone(), crops))
    }

    pub fn layers(&self) -> InMemoryLayers {
        let mut layers = InMemoryLayers::new();
        for column in &self.columns {
            layers.insert_source(
                LayerSource::new(&column.table, &column.field),
                column
                    .cells
                    .iter()
                    .map(|cell| (Location::new(cell.lat, cell.lng), cell.value)),
            );
        }
        layers
    }

    /// Locations to compute, in document order without duplicates.
    pub fn cell_locations(&self) -> Vec<Location> {
        if !self.locations.is_empty() {
            return self.locations.clone();
        }
        let mut seen = BTreeSet::new();
        self.columns
            .iter()
            .flat_map(|column| column.cells.iter())
            .map(|cell| Location::new(cell.lat, cell.lng))
            .filter(|location| seen.insert(location.key()))
            .collect()
    }
}
