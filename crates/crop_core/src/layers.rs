//! Per-location data layers read and written by the crop model.
//!
//! The model only talks to [`LayerStore`]. Where the values actually live
//! (tiles behind a map widget, a database, memory) is the store's business.
//! [`InMemoryLayers`] backs tests and the batch runner.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::mgmt::MgmtComponent;

/// A geographic location in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Key snapped to micro-degrees, so the same cell read from different
    /// sources lands on the same entry.
    pub fn key(&self) -> LocationKey {
        LocationKey {
            lat_micro: (self.lat * 1e6).round() as i64,
            lng_micro: (self.lng * 1e6).round() as i64,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lng)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey {
    lat_micro: i64,
    lng_micro: i64,
}

/// Layers the crop model loads or computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerName {
    Area,
    Yield,
    Precip,
    BaseGdd,
    ScenarioGdd,
    Nitrogen,
    Phosphorus,
    Potassium,
    Irrigation,
    ScenarioYield,
    ScenarioPrecip,
    ScenarioNitrogen,
    ScenarioPhosphorus,
    ScenarioPotassium,
    ScenarioIrrigation,
    ScenarioExcessNitrogen,
    ScenarioExcessPhosphorus,
    ScenarioExcessPotassium,
    ScenarioExcessIrrigation,
}

impl LayerName {
    pub fn label(self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::Yield => "yield",
            Self::Precip => "moisture",
            Self::BaseGdd => "GDD",
            Self::ScenarioGdd => "s GDD",
            Self::Nitrogen => "applied nitrogen",
            Self::Phosphorus => "applied phosphorus",
            Self::Potassium => "applied potassium",
            Self::Irrigation => "applied irrigation",
            Self::ScenarioYield => "s yield",
            Self::ScenarioPrecip => "s moisture",
            Self::ScenarioNitrogen => "s nitrogen",
            Self::ScenarioPhosphorus => "s phosphorus",
            Self::ScenarioPotassium => "s potassium",
            Self::ScenarioIrrigation => "s irrigation",
            Self::ScenarioExcessNitrogen => "s excess nitrogen",
            Self::ScenarioExcessPhosphorus => "s excess phosphorus",
            Self::ScenarioExcessPotassium => "s excess potassium",
            Self::ScenarioExcessIrrigation => "s excess irrigation",
        }
    }

    /// Baseline layer holding the applied amount of `component`.
    pub fn applied(component: MgmtComponent) -> Self {
        match component {
            MgmtComponent::Nitrogen => Self::Nitrogen,
            MgmtComponent::Phosphorus => Self::Phosphorus,
            MgmtComponent::Potassium => Self::Potassium,
            MgmtComponent::Irrigation => Self::Irrigation,
        }
    }

    /// Computed layer holding the scenario amount of `component`.
    pub fn scenario_applied(component: MgmtComponent) -> Self {
        match component {
            MgmtComponent::Nitrogen => Self::ScenarioNitrogen,
            MgmtComponent::Phosphorus => Self::ScenarioPhosphorus,
            MgmtComponent::Potassium => Self::ScenarioPotassium,
            MgmtComponent::Irrigation => Self::ScenarioIrrigation,
        }
    }

    /// Computed layer holding the scenario excess of `component`.
    pub fn scenario_excess(component: MgmtComponent) -> Self {
        match component {
            MgmtComponent::Nitrogen => Self::ScenarioExcessNitrogen,
            MgmtComponent::Phosphorus => Self::ScenarioExcessPhosphorus,
            MgmtComponent::Potassium => Self::ScenarioExcessPotassium,
            MgmtComponent::Irrigation => Self::ScenarioExcessIrrigation,
        }
    }
}

impl fmt::Display for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Table and field a data layer is read from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerSource {
    pub table: String,
    pub field: String,
}

impl LayerSource {
    pub fn new<T: Into<String>, F: Into<String>>(table: T, field: F) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for LayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.field)
    }
}

/// Read/write access to per-location layer values.
pub trait LayerStore {
    /// Whether `layer` is currently bound to data or computed.
    fn has_layer(&self, layer: LayerName) -> bool;

    /// Value of `layer` at `location`, or `None` when the layer or the cell
    /// has no data.
    fn value(&self, location: &Location, layer: LayerName) -> Option<f64>;

    /// Store a value. Writes to a layer that does not exist are dropped.
    fn set_value(&mut self, location: &Location, layer: LayerName, value: Option<f64>);

    /// Point `layer` at a table field.
    fn bind_layer(&mut self, layer: LayerName, source: LayerSource);

    /// Reset a computed layer when `base` exists, remove it otherwise.
    fn replace_computed_layer(&mut self, layer: LayerName, base: LayerName);

    fn remove_layer(&mut self, layer: LayerName);
}

type Cells = BTreeMap<LocationKey, Option<f64>>;

#[derive(Clone, Debug)]
enum Layer {
    Bound(LayerSource),
    Computed(Cells),
}

/// Layer store over preloaded table fields.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLayers {
    sources: BTreeMap<LayerSource, Cells>,
    layers: BTreeMap<LayerName, Layer>,
}

impl InMemoryLayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the values of one table field.
    pub fn insert_source<I>(&mut self, source: LayerSource, values: I)
    where
        I: IntoIterator<Item = (Location, Option<f64>)>,
    {
        let cells = self.sources.entry(source).or_default();
        for (location, value) in values {
            cells.insert(location.key(), value);
        }
    }

    pub fn has_source(&self, source: &LayerSource) -> bool {
        self.sources.contains_key(source)
    }

    /// Source a data layer is bound to, if any.
    pub fn source_of(&self, layer: LayerName) -> Option<&LayerSource> {
        match self.layers.get(&layer)? {
            Layer::Bound(source) => Some(source),
            Layer::Computed(_) => None,
        }
    }

    pub fn layer_names(&self) -> Vec<LayerName> {
        self.layers.keys().copied().collect()
    }
}

impl LayerStore for InMemoryLayers {
    fn has_layer(&self, layer: LayerName) -> bool {
        self.layers.contains_key(&layer)
    }

    fn value(&self, location: &Location, layer: LayerName) -> Option<f64> {
        let cells = match self.layers.get(&layer)? {
            Layer::Bound(source) => self.sources.get(source)?,
            Layer::Computed(cells) => cells,
        };
        cells.get(&location.key()).copied().flatten()
    }

    fn set_value(&mut self, location: &Location, layer: LayerName, value: Option<f64>) {
        let cells = match self.layers.get_mut(&layer) {
            Some(Layer::Bound(source)) => match self.sources.get_mut(source) {
                Some(cells) => cells,
                None => return,
            },
            Some(Layer::Computed(cells)) => cells,
            None => return,
        };
        cells.insert(location.key(), value);
    }

    fn bind_layer(&mut self, layer: LayerName, source: LayerSource) {
        if self.sources.contains_key(&source) {
            self.layers.insert(layer, Layer::Bound(source));
        } else {
            warn!(%layer, %source, "no data for layer source");
            self.layers.remove(&layer);
        }
    }

    fn replace_computed_layer(&mut self, layer: LayerName, base: LayerName) {
        if self.has_layer(base) {
            self.layers.insert(layer, Layer::Computed(Cells::new()));
        } else {
            self.layers.remove(&layer);
        }
    }

    fn remove_layer(&mut self, layer: LayerName) {
        self.layers.remove(&layer);
    }
}
