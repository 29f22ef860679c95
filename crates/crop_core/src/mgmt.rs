use std::fmt;

use serde::{Deserialize, Serialize};

use crate::nullable;

/// Management components, always applied in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MgmtComponent {
    #[serde(rename = "N")]
    Nitrogen,
    #[serde(rename = "P")]
    Phosphorus,
    #[serde(rename = "K")]
    Potassium,
    #[serde(rename = "I")]
    Irrigation,
}

impl MgmtComponent {
    pub const ALL: [MgmtComponent; 4] = [
        MgmtComponent::Nitrogen,
        MgmtComponent::Phosphorus,
        MgmtComponent::Potassium,
        MgmtComponent::Irrigation,
    ];

    pub const fn index(self) -> usize {
        match self {
            Self::Nitrogen => 0,
            Self::Phosphorus => 1,
            Self::Potassium => 2,
            Self::Irrigation => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Nitrogen => "N",
            Self::Phosphorus => "P",
            Self::Potassium => "K",
            Self::Irrigation => "I",
        }
    }
}

/// Fertilizer (N, P, K in kg/ha) and irrigation (fraction of area) inputs.
///
/// Each component may be unknown. The type is `Copy`, so every constructor,
/// including the one taking another instance, yields an independent vector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MgmtInputs {
    values: [Option<f64>; 4],
}

impl MgmtInputs {
    /// All components unknown.
    pub const EMPTY: MgmtInputs = MgmtInputs { values: [None; 4] };

    pub const fn new(values: [Option<f64>; 4]) -> Self {
        Self { values }
    }

    /// All components zero; the starting point for accumulation.
    pub const fn zeroed() -> Self {
        Self {
            values: [Some(0.0); 4],
        }
    }

    pub fn values(&self) -> [Option<f64>; 4] {
        self.values
    }

    pub fn get(&self, component: MgmtComponent) -> Option<f64> {
        self.values[component.index()]
    }

    pub fn set(&mut self, component: MgmtComponent, value: Option<f64>) {
        self.values[component.index()] = value;
    }

    pub fn nitrogen(&self) -> Option<f64> {
        self.get(MgmtComponent::Nitrogen)
    }

    pub fn phosphorus(&self) -> Option<f64> {
        self.get(MgmtComponent::Phosphorus)
    }

    pub fn potassium(&self) -> Option<f64> {
        self.get(MgmtComponent::Potassium)
    }

    pub fn irrigation(&self) -> Option<f64> {
        self.get(MgmtComponent::Irrigation)
    }

    /// N + P + K, or `None` when any of the three is unknown.
    pub fn fertilizer_total(&self) -> Option<f64> {
        let np = nullable::add(self.nitrogen(), self.phosphorus());
        nullable::add(np, self.potassium())
    }

    /// Add `value` to a component. A `None` value is ignored; an unknown
    /// component stays unknown.
    pub fn add_to(&mut self, component: MgmtComponent, value: Option<f64>) {
        if value.is_some() {
            let slot = &mut self.values[component.index()];
            *slot = nullable::add(*slot, value);
        }
    }

    /// Multiply every known component by `factor` in place.
    pub fn scale(&mut self, factor: f64) -> &mut Self {
        for value in self.values.iter_mut().flatten() {
            *value *= factor;
        }
        self
    }

    /// Copy of `self` where every known component of `overrides` wins.
    pub fn overlay(&self, overrides: &MgmtInputs) -> MgmtInputs {
        let mut merged = *self;
        for component in MgmtComponent::ALL {
            if let Some(value) = overrides.get(component) {
                merged.set(component, Some(value));
            }
        }
        merged
    }
}

impl From<[Option<f64>; 4]> for MgmtInputs {
    fn from(values: [Option<f64>; 4]) -> Self {
        Self::new(values)
    }
}

impl From<[f64; 4]> for MgmtInputs {
    fn from(values: [f64; 4]) -> Self {
        Self::new(values.map(Some))
    }
}

impl From<&MgmtInputs> for MgmtInputs {
    fn from(other: &MgmtInputs) -> Self {
        *other
    }
}

impl fmt::Display for MgmtInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|value| match value {
                Some(v) => v.to_string(),
                None => "null".to_string(),
            })
            .collect();
        write!(f, "MgmtInputs({})", parts.join(", "))
    }
}
