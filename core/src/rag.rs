use crate::chunker::Chunker;
use crate::config::RagConfig;
use crate::error::{RagError, Result};
use crate::extract::{SourceFile, TextExtractor};
use crate::index::{Chunk, DocumentIndex, DocumentStats, ScoredChunk};
use crate::persist::{load_or_empty, load_snapshot, save_snapshot, SnapshotFormat};
use crate::tokenizer::{JiebaSegmenter, KeywordExtractor, Segmenter};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub success: bool,
    pub message: String,
    pub chunks: usize,
}

impl IngestOutcome {
    fn processed(filename: &str, chunks: usize) -> Self {
        Self {
            success: true,
            message: format!("processed document {filename} into {chunks} chunks"),
            chunks,
        }
    }

    fn failed(error: &RagError) -> Self {
        Self { success: false, message: error.to_string(), chunks: 0 }
    }
}

/// Document ingestion and retrieval over one shared [`DocumentIndex`].
///
/// Ingest, delete, save and reload hold the write lock for their whole
/// duration, so a search never sees a half-replaced document.
pub struct RagSystem<S: Segmenter = JiebaSegmenter> {
    index: RwLock<DocumentIndex>,
    chunker: Chunker<S>,
    snapshot: Option<(PathBuf, SnapshotFormat)>,
    default_top_k: usize,
}

impl RagSystem<JiebaSegmenter> {
    /// Build a system with the jieba segmenter, loading the configured
    /// snapshot if there is one.
    pub fn open(config: RagConfig) -> Result<Self> {
        Self::with_segmenter(config, JiebaSegmenter)
    }

    pub fn in_memory(config: RagConfig) -> Result<Self> {
        Self::with_segmenter(RagConfig { index_path: None, ..config }, JiebaSegmenter)
    }
}

impl<S: Segmenter> RagSystem<S> {
    pub fn with_segmenter(config: RagConfig, segmenter: S) -> Result<Self> {
        config.validate()?;
        let snapshot = config
            .index_path
            .clone()
            .map(|path| (path, config.snapshot_format()));
        let index = match &snapshot {
            Some((path, format)) => load_or_empty(path, *format),
            None => DocumentIndex::new(),
        };
        Ok(Self {
            index: RwLock::new(index),
            chunker: Chunker::new(config.chunker(), KeywordExtractor::new(segmenter)),
            snapshot,
            default_top_k: config.top_k,
        })
    }

    pub fn index_path(&self) -> Option<&Path> {
        self.snapshot.as_ref().map(|(path, _)| path.as_path())
    }

    pub fn default_top_k(&self) -> usize { self.default_top_k }

    pub fn chunker(&self) -> &Chunker<S> { &self.chunker }

    /// Only documents ingested afterwards are affected.
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunker.set_chunk_size(chunk_size.max(1));
    }

    /// Extract, chunk and index `file`, replacing any earlier version with the
    /// same name. Failures are reported in the outcome rather than returned.
    pub fn add_document(&self, file: &SourceFile, extractor: &dyn TextExtractor) -> IngestOutcome {
        match self.try_add_document(file, extractor) {
            Ok(chunks) => IngestOutcome::processed(&file.name, chunks),
            Err(e) => {
                tracing::warn!(filename = %file.name, error = %e, "document ingestion failed");
                IngestOutcome::failed(&e)
            }
        }
    }

    /// [`add_document`](Self::add_document) for text that is already extracted.
    pub fn add_text(&self, content: &str, filename: &str) -> IngestOutcome {
        match self.try_add_text(content, filename) {
            Ok(chunks) => IngestOutcome::processed(filename, chunks),
            Err(e) => {
                tracing::warn!(filename, error = %e, "document ingestion failed");
                IngestOutcome::failed(&e)
            }
        }
    }

    pub fn try_add_document(&self, file: &SourceFile, extractor: &dyn TextExtractor) -> Result<usize> {
        let content = extractor
            .read_file(file)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| RagError::EmptyDocument(file.name.clone()))?;
        self.try_add_text(&content, &file.name)
    }

    /// Returns the number of chunks indexed. A failed save leaves the new
    /// chunks in memory and returns the error.
    pub fn try_add_text(&self, content: &str, filename: &str) -> Result<usize> {
        if content.trim().is_empty() {
            return Err(RagError::EmptyDocument(filename.to_string()));
        }
        let chunks = self.chunker.split_document(content, filename);
        if chunks.is_empty() {
            return Err(RagError::ChunkingFailed(filename.to_string()));
        }

        let mut index = self.index.write();
        let replaced = index.delete_document(filename);
        let count = chunks.len();
        index.add_document_chunks(chunks);
        tracing::info!(filename, chunks = count, replaced, "indexed document");
        self.persist(&index)?;
        Ok(count)
    }

    pub fn search_documents(&self, query: &str, top_k: usize) -> Vec<ScoredChunk> {
        let index = self.index.read();
        let hits = index.search_by_keywords(self.chunker.extractor(), query, top_k);
        tracing::debug!(query, top_k, hits = hits.len(), "searched documents");
        hits
    }

    pub fn generate_rag_prompt<C: AsRef<Chunk>>(&self, query: &str, context_chunks: &[C]) -> String {
        generate_rag_prompt(query, context_chunks)
    }

    /// Search and wrap the hits into a prompt. Without hits the query is
    /// returned unchanged.
    pub fn enhance_query(&self, query: &str, top_k: usize) -> (String, Vec<ScoredChunk>) {
        let hits = self.search_documents(query, top_k);
        if hits.is_empty() {
            return (query.to_string(), hits);
        }
        (generate_rag_prompt(query, &hits), hits)
    }

    pub fn get_document_stats(&self) -> DocumentStats {
        self.index.read().stats()
    }

    pub fn delete_document(&self, filename: &str) -> Result<String> {
        let mut index = self.index.write();
        let removed = index.delete_document(filename);
        tracing::info!(filename, removed, "deleted document");
        self.persist(&index)?;
        Ok(format!("deleted document: {filename}"))
    }

    pub fn save_index(&self) -> Result<()> {
        let index = self.index.write();
        self.persist(&index)
    }

    /// Replace the in-memory index with the snapshot on disk. A corrupt
    /// snapshot resets to an empty index.
    pub fn reload_index(&self) -> Result<()> {
        let Some((path, format)) = &self.snapshot else { return Ok(()) };
        let mut index = self.index.write();
        *index = match load_snapshot(path, *format) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => DocumentIndex::new(),
            Err(e @ RagError::IndexCorrupt { .. }) => {
                tracing::warn!(error = %e, "index snapshot corrupt, resetting to empty index");
                DocumentIndex::new()
            }
            Err(e) => return Err(e),
        };
        Ok(())
    }

    /// Clone of the current index, for inspection.
    pub fn snapshot_index(&self) -> DocumentIndex {
        self.index.read().clone()
    }

    fn persist(&self, index: &DocumentIndex) -> Result<()> {
        match &self.snapshot {
            Some((path, format)) => save_snapshot(path, *format, index),
            None => Ok(()),
        }
    }
}

/// Wrap `query` with the content of `context_chunks`, each labelled by its
/// source file. With no chunks the query is returned as is.
pub fn generate_rag_prompt<C: AsRef<Chunk>>(query: &str, context_chunks: &[C]) -> String {
    if context_chunks.is_empty() {
        return query.to_string();
    }

    let context_text = context_chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let chunk = chunk.as_ref();
            format!("文档片段 {} (来源: {}):\n{}", i + 1, chunk.filename, chunk.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "请基于以下文档内容回答问题。\n\n相关文档内容：\n{context_text}\n\n用户问题：{query}\n\n请根据上述文档内容回答问题。如果文档中没有相关信息，请明确说明。"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::NgramSegmenter;

    fn system() -> RagSystem<NgramSegmenter> {
        let config = RagConfig { chunk_size: 40, overlap: 5, index_path: None, ..RagConfig::default() };
        RagSystem::with_segmenter(config, NgramSegmenter).unwrap()
    }

    #[test]
    fn prompt_passthrough_without_context() {
        assert_eq!(generate_rag_prompt::<Chunk>("你好", &[]), "你好");
    }

    #[test]
    fn prompt_labels_sources() {
        let chunk = Chunk {
            chunk_id: "a.txt_0".into(),
            filename: "a.txt".into(),
            content: "索引内容".into(),
            start_pos: 0,
            end_pos: 4,
            keywords: vec![],
        };
        let prompt = generate_rag_prompt("问题", &[chunk]);
        assert!(prompt.starts_with("请基于以下文档内容回答问题。"));
        assert!(prompt.contains("文档片段 1 (来源: a.txt):\n索引内容"));
        assert!(prompt.contains("用户问题：问题"));
        assert!(prompt.ends_with("如果文档中没有相关信息，请明确说明。"));
    }

    #[test]
    fn empty_text_is_rejected_without_mutation() {
        let rag = system();
        rag.add_text("rust index", "a");
        let outcome = rag.add_text("   ", "a");
        assert!(!outcome.success);
        assert_eq!(rag.get_document_stats().files.get("a"), Some(&1));
    }

    #[test]
    fn chunk_size_change_applies_to_later_ingests() {
        let mut rag = system();
        let text = "Rust keeps the index in memory.\nSearch reads it under a shared lock.\n".repeat(4);
        let before = rag.add_text(&text, "a").chunks;

        rag.set_chunk_size(400);
        assert_eq!(rag.chunker().config().chunk_size, 400);
        let after = rag.add_text(&text, "b").chunks;

        let stats = rag.get_document_stats();
        assert_eq!(stats.files.get("a"), Some(&before));
        assert_eq!(stats.files.get("b"), Some(&after));
        assert!(after < before);
    }

    #[test]
    fn enhance_query_without_hits_returns_query() {
        let rag = system();
        let (prompt, hits) = rag.enhance_query("nothing here", 3);
        assert_eq!(prompt, "nothing here");
        assert!(hits.is_empty());
    }
}
