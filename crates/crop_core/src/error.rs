use thiserror::Error;

use crate::layers::Location;

/// Lookup-table schema problems. These indicate a mismatch between the loaded
/// data and the columns the model reads, so callers treat them as fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("table {table} has no header row")]
    MissingHeader { table: String },
}

/// Failures of the scenario orchestration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("unknown crop {0:?}")]
    UnknownCrop(String),
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Aggregation aborts on a yield delta that is neither positive, negative nor
/// zero. That only happens when NaN slipped through upstream data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AggregateError {
    #[error("yield delta for cell {index} at {location} is not a number")]
    NonNumericYieldDelta { index: usize, location: Location },
}

/// Scenario controls that cannot be modeled with the available data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SanityError {
    #[error("Temperature change is not a number!")]
    TemperatureNotANumber,
    #[error("Can't parse precipitation change!")]
    PrecipitationNotANumber,
    #[error("Temperature change out of range!")]
    TemperatureOutOfRange { gdd_index: f64 },
    #[error("unknown crop {0:?}")]
    UnknownCrop(String),
}
