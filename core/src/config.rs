use crate::chunker::ChunkerConfig;
use crate::error::{RagError, Result};
use crate::persist::SnapshotFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_INDEX_FILE: &str = "document_index.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    /// Chunks returned when a caller does not ask for a specific count.
    pub top_k: usize,
    /// Snapshot location; `None` keeps the index in memory only.
    pub index_path: Option<PathBuf>,
    /// Overrides the format implied by the snapshot file extension.
    pub snapshot_format: Option<SnapshotFormat>,
}

impl Default for RagConfig {
    fn default() -> Self {
        let chunker = ChunkerConfig::default();
        Self {
            chunk_size: chunker.chunk_size,
            overlap: chunker.overlap,
            top_k: 3,
            index_path: Some(PathBuf::from(DEFAULT_INDEX_FILE)),
            snapshot_format: None,
        }
    }
}

impl RagConfig {
    /// Defaults overlaid with `RAG_CHUNK_SIZE`, `RAG_OVERLAP`, `RAG_TOP_K` and
    /// `RAG_INDEX_PATH`.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "RAG_CHUNK_SIZE")? { config.chunk_size = v; }
        if let Some(v) = parse_var(&lookup, "RAG_OVERLAP")? { config.overlap = v; }
        if let Some(v) = parse_var(&lookup, "RAG_TOP_K")? { config.top_k = v; }
        if let Some(path) = lookup("RAG_INDEX_PATH") {
            if !path.trim().is_empty() {
                config.index_path = Some(PathBuf::from(path));
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be at least 1".into()));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be at least 1".into()));
        }
        Ok(())
    }

    pub fn chunker(&self) -> ChunkerConfig {
        ChunkerConfig { chunk_size: self.chunk_size, overlap: self.overlap }
    }

    pub fn snapshot_format(&self) -> SnapshotFormat {
        self.snapshot_format.unwrap_or_else(|| {
            self.index_path
                .as_deref()
                .map(SnapshotFormat::from_path)
                .unwrap_or_default()
        })
    }
}

fn parse_var<F>(lookup: &F, key: &str) -> Result<Option<usize>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| RagError::Config(format!("{key} must be a non-negative integer, got {v:?}"))),
        None => Ok(None),
    }
}
