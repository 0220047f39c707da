use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ragdesk_cli::{init_tracing, App};
use ragdesk_core::corpus::source_name;
use ragdesk_core::traits::ConversationStore;
use ragdesk_core::types::ChunkStrategy;

#[derive(Parser)]
#[command(name = "ragdesk")]
#[command(about = "Retrieval-augmented support assistant with human hand-off")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question
    Ask {
        question: String,

        #[arg(short, long, default_value = "123")]
        user: String,

        /// Keep the conversation in memory only
        #[arg(long)]
        ephemeral: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive session over stdin
    Chat {
        #[arg(short, long, default_value = "123")]
        user: String,

        #[arg(long)]
        ephemeral: bool,
    },

    /// Show which index pairs load
    Status,

    /// Escalation statistics of the conversation log
    Stats,

    /// Preview how a document is chunked
    Chunk {
        input: PathBuf,

        /// Defaults to the strategy configured for the file's source name
        #[arg(short, long)]
        strategy: Option<ChunkStrategy>,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let app = App::load()?;

    match cli.command {
        Commands::Ask { question, user, ephemeral, json } => {
            let (pipeline, _) = app.pipeline(ephemeral)?;
            let outcome = pipeline.handle(&user, &question)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.answer());
            }
        }

        Commands::Chat { user, ephemeral } => {
            let (pipeline, report) = app.pipeline(ephemeral)?;
            println!("Loaded {} sources. Type 'exit' to quit.", report.loaded.len());
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            loop {
                print!("> ");
                stdout.flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
                    break;
                }
                match pipeline.handle(&user, question) {
                    Ok(outcome) => println!("{}\n", outcome.answer()),
                    Err(e) => eprintln!("error: {e}\n"),
                }
            }
        }

        Commands::Status => {
            let store = app.pair_store();
            let (state, report) = store.load_all()?;
            println!("Index directory: {}", store.dir().display());
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!("{} sources, {} chunks", state.len(), state.total_chunks());
        }

        Commands::Stats => {
            let stats = app.conversation_store(false)?.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Commands::Chunk { input, strategy } => {
            let text = std::fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;
            let strategy = strategy
                .or_else(|| source_name(&input).and_then(|name| app.strategies(None).resolve(&name)))
                .unwrap_or(ChunkStrategy::Sentence);
            let chunks = app.chunker().chunk(&text, strategy);

            println!("Chunked '{}' into {} chunks using {} strategy:\n", input.display(), chunks.len(), strategy);
            for (i, chunk) in chunks.iter().enumerate() {
                println!("--- Chunk {} ({} chars) ---", i + 1, chunk.chars().count());
                println!("{chunk}\n");
            }
        }
    }
    Ok(())
}
