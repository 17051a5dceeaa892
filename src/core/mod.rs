//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

pub use loaders::{
    CollarRecord, CompositeRow, CompositeValue, DesurveyedSample, LoaderError, SampleValue,
    SourceInterval, SourceTable, SurveyStation, ValueKind,
};
pub use transforms::Position;
pub use writers::{write_composite_csv, write_desurvey_csv, write_hole_report_csv, WriteError};
