//! wordshard Binary
//!
//! Counts the words of a text file with the sharded engine, prints every
//! word with its count, then the count of one keyword.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use wordshard::{source, Config, Engine, WordShardError};

/// wordshard word counter
#[derive(Parser, Debug)]
#[command(name = "wordshard")]
#[command(about = "Sharded, multi-threaded word counter")]
#[command(version)]
struct Args {
    /// Input text file
    input: PathBuf,

    /// Number of mapper workers
    mappers: usize,

    /// Number of partitioner workers
    partitioners: usize,

    /// Number of reducer shards
    shards: usize,

    /// Word whose count is printed last
    #[arg(short, long, default_value = "TCP")]
    keyword: String,

    /// Give up on queries after this many milliseconds
    #[arg(short = 't', long)]
    query_timeout_ms: Option<u64>,

    /// Pipeline channel capacity (0 = rendezvous)
    #[arg(short, long, default_value = "0")]
    channel_capacity: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wordshard=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    tracing::info!("wordshard v{}", wordshard::VERSION);

    // Build config from args
    let mut builder = Config::builder()
        .mapper_count(args.mappers)
        .partitioner_count(args.partitioners)
        .shard_count(args.shards)
        .channel_capacity(args.channel_capacity);
    if let Some(ms) = args.query_timeout_ms {
        builder = builder.query_timeout(Duration::from_millis(ms));
    }
    let config = builder.build();

    let engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to start engine: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&engine, &args) {
        tracing::error!("{}", e);
        let code = match e {
            WordShardError::Io(_) => 2,
            _ => 1,
        };
        if let Err(e) = engine.shutdown() {
            tracing::warn!("Shutdown after failure also failed: {}", e);
        }
        std::process::exit(code);
    }

    match engine.shutdown() {
        Ok(report) => tracing::info!(
            "Counted {} words ({} distinct) in {} lines",
            report.words,
            report.distinct_words,
            report.lines
        ),
        Err(e) => {
            tracing::error!("Shutdown failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(engine: &Engine, args: &Args) -> wordshard::Result<()> {
    let lines = source::feed_file(engine, &args.input)?;
    tracing::info!("Fed {} lines from {}", lines, args.input.display());

    let mut counts: Vec<(String, u64)> = engine.query_all()?.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (word, count) in &counts {
        println!("{} {}", word, count);
    }

    println!("{}", engine.query(&args.keyword)?);
    Ok(())
}
