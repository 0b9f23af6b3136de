use std::path::PathBuf;

use thiserror::Error;

/// Failures the data pipeline reports for malformed inputs or configs.
///
/// Everything else (I/O, decoding) travels as `anyhow::Error` with context;
/// these variants exist so callers can match on the common mistakes.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Can't find requested file: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("block '{block}' has no field '{field}'")]
    MissingField { block: String, field: String },

    #[error("shape mismatch in '{block}': {detail}")]
    ShapeMismatch { block: String, detail: String },

    #[error("unknown kinematic variable '{0}'")]
    UnknownKinematic(String),

    #[error("unsupported event file format '.{0}'")]
    UnsupportedFormat(String),

    #[error("event {index} is out of range for {n_events} events")]
    EventOutOfRange { index: usize, n_events: usize },

    #[error("dataset contains no events")]
    EmptyDataset,
}
