use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Error)]
pub enum RagError {
    /// Extraction produced no usable text.
    #[error("document {0} has no readable text")]
    EmptyDocument(String),

    /// Text was present but no chunk survived trimming.
    #[error("document {0} produced no chunks")]
    ChunkingFailed(String),

    #[error("index snapshot {path} is corrupt: {reason}")]
    IndexCorrupt { path: PathBuf, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for RagError {
    fn from(e: serde_json::Error) -> Self {
        RagError::Serialize(e.to_string())
    }
}

impl From<bincode::Error> for RagError {
    fn from(e: bincode::Error) -> Self {
        RagError::Serialize(e.to_string())
    }
}
