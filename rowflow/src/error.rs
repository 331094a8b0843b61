use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::row::ValueKind;

pub type Result<T> = std::result::Result<T, FlowError>;

/// Everything that can go wrong while materialising a graph.  Errors
/// surface in band on the row stream; no operator recovers locally.
#[derive(Debug, Error)]
pub enum FlowError {
    /// No factory was registered under the requested source name.
    #[error("unknown input source {0:?}")]
    UnknownSource(String),

    #[error("failed to read {path:?}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse line {line} of {path:?}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("row has no field {field:?}")]
    MissingField { field: String },

    #[error("field {field:?} holds {found} where {expected} was expected")]
    FieldKind {
        field: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("field {field:?} is unusable: {reason}")]
    Field { field: String, reason: String },

    /// A sorted input handed to join regressed.
    #[error("sorted input regressed from key ({prev}) to ({next})")]
    Ordering { prev: String, next: String },

    #[error("sort spill i/o failed")]
    Spill(#[source] io::Error),

    #[error("sort spill record was malformed")]
    SpillCodec(#[source] serde_json::Error),

    /// Both co-group sides were empty, which a legal merge walk never
    /// produces.
    #[error("join was handed two empty groups")]
    EmptyJoin,

    /// Failure raised inside a user supplied mapper, reducer or joiner.
    #[error(transparent)]
    User(#[from] anyhow::Error),
}
