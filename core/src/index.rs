use crate::tokenizer::{KeywordExtractor, Segmenter};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{filename}_{n}`, n counting emitted chunks from 0
    pub chunk_id: String,
    pub filename: String,
    pub content: String,
    /// Character offsets of the untrimmed span in the source text.
    pub start_pos: usize,
    pub end_pos: usize,
    pub keywords: Vec<String>,
}

impl AsRef<Chunk> for Chunk {
    fn as_ref(&self) -> &Chunk { self }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub chunk_id: String,
    pub filename: String,
    /// Occurrences of the keyword within the chunk's keyword list.
    pub relevance: u32,
}

/// A search hit: a copy of the chunk with its accumulated score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub relevance_score: f64,
}

impl AsRef<Chunk> for ScoredChunk {
    fn as_ref(&self) -> &Chunk { &self.chunk }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub total_chunks: usize,
    pub total_keywords: usize,
    pub files: BTreeMap<String, usize>,
}

/// Keyword → postings over chunks, plus the chunks themselves.
///
/// Every posting refers to a chunk present in `document_chunks`, and a keyword
/// holds at most one posting per chunk. Both maps are ordered so snapshots and
/// score ties are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentIndex {
    keyword_index: BTreeMap<String, Vec<Posting>>,
    document_chunks: BTreeMap<String, Chunk>,
}

impl DocumentIndex {
    pub fn new() -> Self { Self::default() }

    /// Build from raw maps without validation; call [`retain_consistent`]
    /// afterwards when the maps come from an untrusted source.
    ///
    /// [`retain_consistent`]: DocumentIndex::retain_consistent
    pub fn from_parts(
        keyword_index: BTreeMap<String, Vec<Posting>>,
        document_chunks: BTreeMap<String, Chunk>,
    ) -> Self {
        Self { keyword_index, document_chunks }
    }

    pub fn keyword_index(&self) -> &BTreeMap<String, Vec<Posting>> { &self.keyword_index }

    pub fn document_chunks(&self) -> &BTreeMap<String, Chunk> { &self.document_chunks }

    pub fn chunk(&self, chunk_id: &str) -> Option<&Chunk> { self.document_chunks.get(chunk_id) }

    pub fn postings(&self, keyword: &str) -> &[Posting] {
        self.keyword_index.get(keyword).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize { self.document_chunks.len() }

    pub fn is_empty(&self) -> bool { self.document_chunks.is_empty() }

    /// Insert chunks, overwriting same-id chunks. Re-adding a chunk never
    /// duplicates its postings.
    pub fn add_document_chunks<I>(&mut self, chunks: I)
    where
        I: IntoIterator<Item = Chunk>,
    {
        for chunk in chunks {
            for keyword in &chunk.keywords {
                let relevance = chunk.keywords.iter().filter(|k| *k == keyword).count() as u32;
                let postings = self.keyword_index.entry(keyword.clone()).or_default();
                if postings.iter().any(|p| p.chunk_id == chunk.chunk_id) { continue; }
                postings.push(Posting {
                    chunk_id: chunk.chunk_id.clone(),
                    filename: chunk.filename.clone(),
                    relevance,
                });
            }
            self.document_chunks.insert(chunk.chunk_id.clone(), chunk);
        }
    }

    /// Rank chunks against the keywords of `query`.
    ///
    /// Each query keyword contributes `relevance * (total_chunks / df)` to every
    /// chunk it has a posting for, where `df` is that keyword's posting count.
    /// Equal scores are ordered by chunk id.
    pub fn search_by_keywords<S: Segmenter>(
        &self,
        extractor: &KeywordExtractor<S>,
        query: &str,
        top_k: usize,
    ) -> Vec<ScoredChunk> {
        let query_keywords = extractor.extract_keywords(query);
        if query_keywords.is_empty() {
            return Vec::new();
        }

        let total = self.document_chunks.len() as f64;
        let mut scores: HashMap<&str, f64> = HashMap::new();
        for keyword in &query_keywords {
            let postings = self.postings(keyword);
            if postings.is_empty() { continue; }
            let idf = total / postings.len() as f64;
            for p in postings {
                *scores.entry(p.chunk_id.as_str()).or_insert(0.0) += p.relevance as f64 * idf;
            }
        }

        let mut ranked: Vec<(&str, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        ranked
            .into_iter()
            .filter_map(|(chunk_id, score)| {
                self.document_chunks
                    .get(chunk_id)
                    .map(|chunk| ScoredChunk { chunk: chunk.clone(), relevance_score: score })
            })
            .take(top_k.max(1))
            .collect()
    }

    /// Remove every chunk of `filename` and its postings. Keywords left without
    /// postings are dropped. Returns the number of chunks removed.
    pub fn delete_document(&mut self, filename: &str) -> usize {
        let doomed: HashSet<String> = self
            .document_chunks
            .values()
            .filter(|c| c.filename == filename)
            .map(|c| c.chunk_id.clone())
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        self.document_chunks.retain(|id, _| !doomed.contains(id));
        self.keyword_index.retain(|_, postings| {
            postings.retain(|p| !doomed.contains(&p.chunk_id));
            !postings.is_empty()
        });
        doomed.len()
    }

    /// Re-key chunks by their own id and drop postings that point at missing
    /// chunks or repeat a chunk under the same keyword. Returns the number of
    /// postings discarded.
    pub fn retain_consistent(&mut self) -> usize {
        let chunks = std::mem::take(&mut self.document_chunks);
        self.document_chunks = chunks.into_values().map(|c| (c.chunk_id.clone(), c)).collect();

        let known = &self.document_chunks;
        let mut dropped = 0;
        self.keyword_index.retain(|_, postings| {
            let before = postings.len();
            let mut seen = HashSet::new();
            postings.retain(|p| known.contains_key(&p.chunk_id) && seen.insert(p.chunk_id.clone()));
            dropped += before - postings.len();
            !postings.is_empty()
        });
        dropped
    }

    pub fn stats(&self) -> DocumentStats {
        let mut files: BTreeMap<String, usize> = BTreeMap::new();
        for chunk in self.document_chunks.values() {
            *files.entry(chunk.filename.clone()).or_insert(0) += 1;
        }
        DocumentStats {
            total_chunks: self.document_chunks.len(),
            total_keywords: self.keyword_index.len(),
            files,
        }
    }
}
