//! Desurvey and compositing engines.

pub mod aggregate;
pub mod batch;
pub mod desurvey;
pub mod error;
pub mod partition;

// Re-export key types for convenience
pub use aggregate::{aggregate, overlap};
pub use batch::{BatchOutput, BatchResult, DrillholeData, HoleBatchRunner, HoleReport, HoleStatus};
pub use desurvey::{integrate, position_at, resample_at, resample_uniform};
pub use error::ProcessingError;
pub use partition::{boundaries_from_intervals, partition, PartitionMode};
