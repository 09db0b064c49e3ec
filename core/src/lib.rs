//! Keyword-based retrieval for retrieval-augmented generation: documents are
//! split into overlapping chunks, chunks are indexed by their keywords, and
//! queries return the best matching chunks for a prompt.

pub mod chunker;
pub mod config;
pub mod error;
pub mod extract;
pub mod index;
pub mod persist;
pub mod rag;
pub mod tokenizer;

pub use chunker::{Chunker, ChunkerConfig};
pub use config::RagConfig;
pub use error::{RagError, Result};
pub use extract::{PlainTextExtractor, SourceFile, TextExtractor};
pub use index::{Chunk, DocumentIndex, DocumentStats, Posting, ScoredChunk};
pub use persist::SnapshotFormat;
pub use rag::{generate_rag_prompt, IngestOutcome, RagSystem};
pub use tokenizer::{extract_keywords, JiebaSegmenter, KeywordExtractor, NgramSegmenter, Segmenter};
