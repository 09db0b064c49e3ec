use crate::index::Chunk;
use crate::tokenizer::{JiebaSegmenter, KeywordExtractor, Segmenter};
use serde::{Deserialize, Serialize};

const SENTENCE_ENDS: [char; 4] = ['。', '！', '？', '\n'];
/// How far back from the nominal end a sentence break is searched for.
const MAX_LOOKBACK: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Target chunk length in characters before boundary adjustment.
    pub chunk_size: usize,
    /// Characters re-read between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { chunk_size: 500, overlap: 50 }
    }
}

/// Splits documents into overlapping, sentence-aware chunks and tags each
/// chunk with its keywords.
#[derive(Debug, Clone, Default)]
pub struct Chunker<S = JiebaSegmenter> {
    config: ChunkerConfig,
    extractor: KeywordExtractor<S>,
}

impl<S: Segmenter> Chunker<S> {
    pub fn new(config: ChunkerConfig, extractor: KeywordExtractor<S>) -> Self {
        Self { config, extractor }
    }

    pub fn config(&self) -> ChunkerConfig { self.config }

    pub fn extractor(&self) -> &KeywordExtractor<S> { &self.extractor }

    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.config.chunk_size = chunk_size;
    }

    /// Split `content` into chunks owned by `filename`.
    ///
    /// Positions are counted in characters. A chunk ends after the last
    /// `。！？\n` found between the half-size mark and the nominal end;
    /// without one it is cut at the nominal end. Whitespace-only spans are
    /// skipped and do not consume a chunk number.
    ///
    /// The next start is `max(start + 1, end - overlap)`. Once a chunk reaches
    /// the end of the text this still only moves forward by that rule, so the
    /// last `overlap` characters also come back as progressively shorter tail
    /// chunks.
    pub fn split_document(&self, content: &str, filename: &str) -> Vec<Chunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = content.chars().collect();
        let len = chars.len();
        let size = self.config.chunk_size.max(1);
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < len {
            let mut end = start.saturating_add(size).min(len);
            if end < len {
                let floor = start.saturating_add(size / 2).max(end.saturating_sub(MAX_LOOKBACK));
                if let Some(i) = (floor + 1..=end).rev().find(|&i| SENTENCE_ENDS.contains(&chars[i])) {
                    end = i + 1;
                }
            }

            let span: String = chars[start..end].iter().collect();
            let text = span.trim();
            if !text.is_empty() {
                chunks.push(Chunk {
                    chunk_id: format!("{}_{}", filename, chunks.len()),
                    filename: filename.to_string(),
                    content: text.to_string(),
                    start_pos: start,
                    end_pos: end,
                    keywords: self.extractor.extract_keywords(text),
                });
            }

            start = (start + 1).max(end.saturating_sub(self.config.overlap));
        }

        tracing::debug!(filename, chunks = chunks.len(), chars = len, "split document");
        chunks
    }
}
