//! Errors raised by the desurvey and compositing engines.

use thiserror::Error;

/// Errors that can occur while processing drillhole data.
///
/// Per-hole variants are captured in the batch report; `InvalidInterval`
/// raised while validating a run's interval spec and `EmptyInput` abort the
/// whole call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessingError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("no collar record for hole '{0}'")]
    MissingCollar(String),

    #[error("survey station at depth {depth} follows deeper station at {previous}")]
    UnorderedStations { previous: f64, depth: f64 },

    #[error("invalid interval specification: {0}")]
    InvalidInterval(String),

    #[error("invalid sample interval [{start}, {end}): {reason}")]
    InvalidSample { start: f64, end: f64, reason: String },

    #[error("no holes to process")]
    EmptyInput,
}

/// Result type for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;
