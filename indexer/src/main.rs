use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use rag_core::{PlainTextExtractor, RagConfig, RagSystem, SourceFile};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Manage the keyword index used for retrieval-augmented prompts", long_about = None)]
struct Cli {
    /// Index snapshot file (.json, or .bin for the binary format) [env: RAG_INDEX_PATH]
    #[arg(long)]
    index: Option<PathBuf>,
    /// Target chunk length in characters [env: RAG_CHUNK_SIZE, default: 500]
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Characters shared by consecutive chunks [env: RAG_OVERLAP, default: 50]
    #[arg(long)]
    overlap: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a file, or every file under a directory, replacing earlier versions
    Add {
        path: PathBuf,
    },
    /// Print the chunks that best match a query
    Search {
        query: String,
        /// Defaults to RAG_TOP_K, or 3
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Print the retrieval-augmented prompt for a query
    Prompt {
        query: String,
        /// Defaults to RAG_TOP_K, or 3
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Show chunk and keyword counts per document
    Stats,
    /// Remove a document from the index
    Delete {
        filename: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let mut config = RagConfig::from_env()?;
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(overlap) = cli.overlap {
        config.overlap = overlap;
    }
    if let Some(index) = cli.index {
        config.index_path = Some(index);
    }
    let rag = RagSystem::open(config)?;

    match cli.command {
        Commands::Add { path } => add_path(&rag, &path),
        Commands::Search { query, top_k } => {
            let hits = rag.search_documents(&query, top_k.unwrap_or_else(|| rag.default_top_k()));
            if hits.is_empty() {
                println!("no matching chunks");
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!("#{} {} (score {:.2})", rank + 1, hit.chunk.chunk_id, hit.relevance_score);
                println!("{}\n", hit.chunk.content);
            }
            Ok(())
        }
        Commands::Prompt { query, top_k } => {
            let (prompt, _) = rag.enhance_query(&query, top_k.unwrap_or_else(|| rag.default_top_k()));
            println!("{prompt}");
            Ok(())
        }
        Commands::Stats => {
            println!("{}", serde_json::to_string_pretty(&rag.get_document_stats())?);
            Ok(())
        }
        Commands::Delete { filename } => {
            println!("{}", rag.delete_document(&filename)?);
            Ok(())
        }
    }
}

fn add_path(rag: &RagSystem, path: &Path) -> Result<()> {
    let mut files: Vec<PathBuf> = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            if entry.path().is_file() {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();
    } else if path.is_file() {
        files.push(path.to_path_buf());
    } else {
        bail!("{} is not a file or directory", path.display());
    }

    let mut failed = 0usize;
    for file in &files {
        let mut source = match SourceFile::from_path(file) {
            Ok(source) => source,
            Err(e) => {
                failed += 1;
                eprintln!("{}: {e}", file.display());
                continue;
            }
        };
        // files under a directory are named by their relative path so equal
        // file names in different folders stay separate documents
        if let Ok(rel) = file.strip_prefix(path) {
            if !rel.as_os_str().is_empty() {
                source.name = rel.to_string_lossy().into_owned();
            }
        }
        let outcome = rag.add_document(&source, &PlainTextExtractor);
        if outcome.success {
            println!("{}", outcome.message);
        } else {
            failed += 1;
            eprintln!("{}: {}", file.display(), outcome.message);
        }
    }

    tracing::info!(files = files.len(), failed, "ingestion finished");
    if failed > 0 {
        bail!("{failed} of {} files could not be indexed", files.len());
    }
    Ok(())
}
