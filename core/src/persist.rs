use crate::error::{RagError, Result};
use crate::index::{Chunk, DocumentIndex, Posting};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Header of the binary snapshot format; the trailing digits are the version.
const BINARY_MAGIC: &[u8; 8] = b"RAGIDX01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// `{keyword_index, document_chunks, last_updated}` as pretty JSON.
    #[default]
    Json,
    /// `RAGIDX01` followed by the same record encoded with bincode.
    Binary,
}

impl SnapshotFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("bin") => SnapshotFormat::Binary,
            _ => SnapshotFormat::Json,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexSnapshot {
    #[serde(default)]
    pub keyword_index: BTreeMap<String, Vec<Posting>>,
    #[serde(default)]
    pub document_chunks: BTreeMap<String, Chunk>,
    #[serde(default)]
    pub last_updated: String,
}

// Borrowed mirror of IndexSnapshot so saving does not clone the index.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    keyword_index: &'a BTreeMap<String, Vec<Posting>>,
    document_chunks: &'a BTreeMap<String, Chunk>,
    last_updated: String,
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| "".into())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn encode(snapshot: &SnapshotRef<'_>, format: SnapshotFormat) -> Result<Vec<u8>> {
    match format {
        SnapshotFormat::Json => Ok(serde_json::to_vec_pretty(snapshot)?),
        SnapshotFormat::Binary => {
            let mut out = BINARY_MAGIC.to_vec();
            out.extend(bincode::serialize(snapshot)?);
            Ok(out)
        }
    }
}

fn decode(buf: &[u8], format: SnapshotFormat) -> std::result::Result<IndexSnapshot, String> {
    match format {
        SnapshotFormat::Json => serde_json::from_slice(buf).map_err(|e| e.to_string()),
        SnapshotFormat::Binary => {
            let body = buf
                .strip_prefix(&BINARY_MAGIC[..])
                .ok_or_else(|| "missing RAGIDX01 header".to_string())?;
            bincode::deserialize(body).map_err(|e| e.to_string())
        }
    }
}

fn write_and_replace(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut f = File::create(tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)
}

/// Write the whole index to `path`, replacing any previous snapshot.
pub fn save_snapshot(path: &Path, format: SnapshotFormat, index: &DocumentIndex) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let snapshot = SnapshotRef {
        keyword_index: index.keyword_index(),
        document_chunks: index.document_chunks(),
        last_updated: now_rfc3339(),
    };
    let bytes = encode(&snapshot, format)?;

    let tmp = tmp_path(path);
    if let Err(e) = write_and_replace(&tmp, path, &bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    tracing::info!(path = %path.display(), chunks = index.len(), keywords = index.keyword_index().len(), "saved index snapshot");
    Ok(())
}

/// Read a snapshot. `Ok(None)` when there is no file at `path`.
pub fn load_snapshot(path: &Path, format: SnapshotFormat) -> Result<Option<DocumentIndex>> {
    let mut f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;

    let snapshot = decode(&buf, format)
        .map_err(|reason| RagError::IndexCorrupt { path: path.to_path_buf(), reason })?;
    let mut index = DocumentIndex::from_parts(snapshot.keyword_index, snapshot.document_chunks);
    let dropped = index.retain_consistent();
    if dropped > 0 {
        tracing::warn!(path = %path.display(), dropped, "discarded orphaned postings from snapshot");
    }
    tracing::info!(path = %path.display(), chunks = index.len(), last_updated = %snapshot.last_updated, "loaded index snapshot");
    Ok(Some(index))
}

/// Load a snapshot, falling back to an empty index when the file is missing
/// or unreadable.
pub fn load_or_empty(path: &Path, format: SnapshotFormat) -> DocumentIndex {
    match load_snapshot(path, format) {
        Ok(Some(index)) => index,
        Ok(None) => {
            tracing::info!(path = %path.display(), "no index snapshot, starting empty");
            DocumentIndex::new()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to load index snapshot, starting empty");
            DocumentIndex::new()
        }
    }
}
