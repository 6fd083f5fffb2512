use anyhow::Result;
use clap::{Parser, Subcommand};
use scholar_core::index::build_index;
use scholar_core::persist::{load_documents, save_index, save_meta, MetaFile, StorePaths};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build the field-weighted TF-IDF index from crawled documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full rebuild over the stored corpus, swapped in atomically
    Build {
        /// Store directory holding documents.jsonl; the index artifact is
        /// written alongside it
        #[arg(long, default_value = "./store")]
        store: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { store } => build(&store),
    }
}

fn build(store: &str) -> Result<()> {
    let paths = StorePaths::new(store);
    let documents = load_documents(&paths)?;
    tracing::info!(num_docs = documents.len(), "documents loaded");

    let index = build_index(&documents)?;
    save_index(&paths, &index)?;
    save_meta(
        &paths,
        &MetaFile {
            num_docs: index.num_docs,
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "".into()),
            version: 1,
        },
    )?;

    tracing::info!(store, num_docs = index.num_docs, "index build complete");
    Ok(())
}
