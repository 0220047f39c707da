use std::path::PathBuf;

use clap::Parser;
use ragdesk_cli::{init_tracing, App};
use ragdesk_core::types::ChunkStrategy;

#[derive(Parser)]
#[command(name = "ragdesk-indexer")]
#[command(about = "Chunk, embed and index every document of the corpus")]
#[command(version)]
struct Args {
    /// Directory of .txt/.md documents (defaults to corpus.input_dir)
    input_dir: Option<PathBuf>,

    /// Directory receiving the index/chunk pairs (defaults to corpus.index_dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Strategy for sources without an entry in [corpus.strategies]
    #[arg(short, long)]
    strategy: Option<ChunkStrategy>,

    /// Index at most N documents
    #[arg(long)]
    limit: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let app = App::load()?;

    let input_dir = args.input_dir.unwrap_or_else(|| app.input_dir());
    let ingestor = app.ingestor(args.output, args.strategy)?;

    println!("ragdesk indexer\n===============");
    println!("Input directory: {}", input_dir.display());
    println!("Output directory: {}", ingestor.store().dir().display());
    if let Some(limit) = args.limit {
        println!("Limiting to {limit} documents");
    }

    let report = ingestor.run(&input_dir, args.limit)?;

    println!();
    for source in &report.indexed {
        println!("  indexed  {:<24} {:>5} chunks ({})", source.name, source.chunks, source.strategy);
    }
    for issue in &report.skipped {
        println!("  skipped  {:<24} {}", issue.name, issue.reason);
    }
    for issue in &report.failed {
        println!("  failed   {:<24} {}", issue.name, issue.reason);
    }
    let chunks: usize = report.indexed.iter().map(|s| s.chunks).sum();
    println!("\nIndexed {} sources, {} chunks.", report.indexed.len(), chunks);
    if !report.failed.is_empty() {
        println!("{} sources failed; see the log for details.", report.failed.len());
    }
    Ok(())
}
