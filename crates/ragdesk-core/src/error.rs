use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A build was asked to index a source that produced no chunks.
    #[error("source '{0}' has no chunks to index")]
    EmptyCorpus(String),

    /// Vectors of different sizes within one build, or a query vector that
    /// does not match a loaded index.
    #[error("dimension mismatch at row {row}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        row: usize,
    },

    /// A chunk handed to the index builder is not at the row its ordinal names.
    #[error("chunk '{source_id}'#{ordinal} cannot be stored at row {row} of source '{name}'")]
    MisplacedChunk {
        name: String,
        source_id: String,
        ordinal: usize,
        row: usize,
    },

    #[error("index for source '{0}' has no chunk table")]
    MissingChunkTable(String),

    #[error("source '{name}' returned row {row} but its chunk table has {rows} entries")]
    OutOfRangeHit { name: String, row: usize, rows: usize },

    /// Embedding or generation service failure.
    #[error("{service} service unavailable: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    #[error("failed to notify a human agent: {0}")]
    NotificationFailure(String),

    #[error("corrupt index artifact {path}: {reason}")]
    CorruptIndex { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn upstream(service: &'static str, message: impl ToString) -> Self {
        Self::Upstream {
            service,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
