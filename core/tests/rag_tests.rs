use rag_core::{
    generate_rag_prompt, NgramSegmenter, PlainTextExtractor, RagConfig, RagSystem, ScoredChunk, SourceFile,
};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tempfile::tempdir;

const DOC1: &str = "人工智能是计算机科学的分支。机器学习是人工智能的子领域。";

fn config_at(path: &Path, chunk_size: usize, overlap: usize) -> RagConfig {
    RagConfig { chunk_size, overlap, index_path: Some(path.to_path_buf()), ..RagConfig::default() }
}

#[test]
fn scenario_small_chinese_document() {
    let dir = tempdir().unwrap();
    let rag = RagSystem::open(config_at(&dir.path().join("document_index.json"), 30, 5)).unwrap();

    let outcome = rag.add_text(DOC1, "doc1");
    assert!(outcome.success, "{}", outcome.message);
    assert!(outcome.chunks >= 2);
    let stats = rag.get_document_stats();
    assert!(stats.total_chunks >= 2);
    assert!(rag.snapshot_index().document_chunks().keys().all(|id| id.starts_with("doc1_")));

    let hits = rag.search_documents("机器学习", 3);
    assert!(!hits.is_empty());
    assert!(hits[0].chunk.content.contains("机器学习"));
}

#[test]
fn prompt_without_context_is_the_query() {
    assert_eq!(generate_rag_prompt("你好", &Vec::<ScoredChunk>::new()), "你好");
}

#[test]
fn replacing_a_document_is_idempotent() {
    let rag = RagSystem::with_segmenter(
        RagConfig { chunk_size: 40, overlap: 5, index_path: None, ..RagConfig::default() },
        NgramSegmenter,
    )
    .unwrap();
    let text = "Rust 编写的倒排索引。关键词检索返回文档块！每个文档块带有关键词列表。".repeat(4);

    rag.add_text(&text, "notes.txt");
    let once = rag.get_document_stats();
    rag.add_text(&text, "notes.txt");
    let twice = rag.get_document_stats();
    assert_eq!(once, twice);

    rag.add_text("完全不同的内容。", "notes.txt");
    let replaced = rag.get_document_stats();
    assert_eq!(replaced.files.len(), 1);
    assert!(replaced.total_chunks < once.total_chunks);
    assert!(rag.search_documents("倒排索引", 3).is_empty());
}

#[test]
fn deleting_unknown_document_changes_nothing() {
    let rag = RagSystem::in_memory(RagConfig::default()).unwrap();
    rag.add_text(DOC1, "doc1");
    let before = rag.get_document_stats();
    let message = rag.delete_document("never-ingested.txt").unwrap();
    assert!(message.contains("never-ingested.txt"));
    assert_eq!(rag.get_document_stats(), before);
}

#[test]
fn ingestion_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store").join("document_index.json");
    {
        let rag = RagSystem::open(config_at(&path, 30, 5)).unwrap();
        assert!(rag.add_text(DOC1, "doc1").success);
    }
    let reopened = RagSystem::open(config_at(&path, 30, 5)).unwrap();
    assert!(reopened.get_document_stats().files.contains_key("doc1"));

    reopened.delete_document("doc1").unwrap();
    let again = RagSystem::open(config_at(&path, 30, 5)).unwrap();
    assert_eq!(again.get_document_stats().total_chunks, 0);
    assert_eq!(again.get_document_stats().total_keywords, 0);
}

#[test]
fn binary_snapshot_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.bin");
    let rag = RagSystem::open(config_at(&path, 30, 5)).unwrap();
    rag.add_text(DOC1, "doc1");
    let raw = fs::read(&path).unwrap();
    assert!(raw.starts_with(b"RAGIDX01"));

    let reopened = RagSystem::open(config_at(&path, 30, 5)).unwrap();
    assert_eq!(reopened.snapshot_index(), rag.snapshot_index());
}

#[test]
fn corrupt_snapshot_opens_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("document_index.json");
    fs::write(&path, b"\x00\x01garbage").unwrap();
    let rag = RagSystem::open(config_at(&path, 500, 50)).unwrap();
    assert_eq!(rag.get_document_stats().total_chunks, 0);

    rag.add_text(DOC1, "doc1");
    fs::write(&path, "{ broken").unwrap();
    rag.reload_index().unwrap();
    assert_eq!(rag.get_document_stats().total_chunks, 0);
}

#[test]
fn add_document_uses_extractor() {
    let rag = RagSystem::in_memory(RagConfig::default()).unwrap();
    let file = SourceFile::text("doc1.txt", DOC1);
    let outcome = rag.add_document(&file, &PlainTextExtractor);
    assert!(outcome.success);
    assert!(outcome.message.contains("doc1.txt"));

    let unreadable = |_: &SourceFile| -> Option<String> { None };
    let outcome = rag.add_document(&SourceFile::text("scan.pdf", ""), &unreadable);
    assert!(!outcome.success);
    assert!(!rag.get_document_stats().files.contains_key("scan.pdf"));
}

#[test]
fn batch_continues_past_bad_documents() {
    let rag = RagSystem::in_memory(RagConfig::default()).unwrap();
    let files = vec![
        SourceFile::text("good1.txt", "检索增强生成。"),
        SourceFile::new("broken.txt", "text/plain", vec![0xff, 0xfe]),
        SourceFile::text("good2.txt", "倒排索引。"),
    ];
    let outcomes: Vec<_> = files.iter().map(|f| rag.add_document(f, &PlainTextExtractor)).collect();
    assert_eq!(outcomes.iter().filter(|o| o.success).count(), 2);
    assert_eq!(rag.get_document_stats().files.len(), 2);
}

#[test]
fn save_failure_keeps_memory_state() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "file").unwrap();
    let rag = RagSystem::open(config_at(&blocker.join("index.json"), 500, 50)).unwrap();

    let outcome = rag.add_text(DOC1, "doc1");
    assert!(!outcome.success);
    assert!(rag.get_document_stats().files.contains_key("doc1"));
    assert!(rag.save_index().is_err());
}

#[test]
fn enhance_query_builds_prompt_from_hits() {
    let rag = RagSystem::in_memory(RagConfig::default()).unwrap();
    rag.add_text(DOC1, "ai.txt");
    let (prompt, hits) = rag.enhance_query("机器学习", 3);
    assert!(!hits.is_empty());
    assert!(prompt.contains("(来源: ai.txt)"));
    assert!(prompt.contains("用户问题：机器学习"));
}

#[test]
fn rejected_ingest_keeps_snapshot_in_sync() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("document_index.json");
    let rag = RagSystem::open(config_at(&path, 30, 5)).unwrap();
    assert!(rag.add_text(DOC1, "doc1").success);

    assert!(!rag.add_text(" \n\t ", "doc1").success);
    assert!(rag.get_document_stats().files.contains_key("doc1"));

    let reopened = RagSystem::open(config_at(&path, 30, 5)).unwrap();
    assert_eq!(reopened.snapshot_index(), rag.snapshot_index());
}

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn readers_never_see_a_half_replaced_document() {
    assert_send_sync::<RagSystem>();
    assert_send_sync::<RagSystem<NgramSegmenter>>();

    let rag = RagSystem::with_segmenter(
        RagConfig { chunk_size: 40, overlap: 5, index_path: None, ..RagConfig::default() },
        NgramSegmenter,
    )
    .unwrap();
    let alpha = "alpha keeps the first version.\n".repeat(6);
    let beta = "beta keeps the second, longer version of this text.\n".repeat(9);
    let n_beta = rag.add_text(&beta, "doc").chunks;
    let n_alpha = rag.add_text(&alpha, "doc").chunks;
    assert_ne!(n_alpha, n_beta);

    let done = AtomicBool::new(false);
    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200 {
                let text = if i % 2 == 0 { &beta } else { &alpha };
                assert!(rag.add_text(text, "doc").success);
            }
            done.store(true, Ordering::Release);
        });
        for _ in 0..4 {
            s.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    let stats = rag.get_document_stats();
                    let chunks = stats.files.get("doc").copied();
                    assert!(chunks == Some(n_alpha) || chunks == Some(n_beta), "saw {chunks:?} chunks");
                    assert_eq!(stats.total_chunks, chunks.unwrap_or_default());

                    let hits = rag.search_documents("alpha beta", 100);
                    assert!(!hits.is_empty());
                    let all_alpha = hits.iter().all(|h| h.chunk.content.contains("alpha"));
                    let all_beta = hits.iter().all(|h| h.chunk.content.contains("beta"));
                    assert!(all_alpha || all_beta, "hits mix both versions");
                }
            });
        }
    });
}
