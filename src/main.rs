//! SBS-1 Feed Collector CLI
//!
//! Collects a BaseStation feed (or polls a Virtual Radar Server) and
//! archives it to columnar table files.

use clap::{Parser, Subcommand};
use squitter::{
    client::{ClientConfig, VrsClient},
    collector::{FeedCollector, FeedConfig},
    storage::{SbsRow, TableStore},
    vrs::VrsRow,
    vrs_collector::{PollConfig, VrsCollector},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "squitter")]
#[command(about = "SBS-1 feed collector with columnar table archiving", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect an SBS-1 BaseStation feed continuously
    Collect {
        /// Feed host
        #[arg(long, env = "SBS1_HOST", default_value = "127.0.0.1")]
        host: String,

        /// BaseStation output port
        #[arg(long, env = "SBS1_PORT", default_value = "30004")]
        port: u16,

        /// Output table file
        #[arg(short, long, default_value = "sbs1.tab")]
        table: PathBuf,

        /// Flush interval in seconds
        #[arg(long, default_value = "30")]
        flush_interval: u64,

        /// Size-report interval in seconds
        #[arg(long, default_value = "45")]
        status_interval: u64,
    },

    /// Poll a Virtual Radar Server aircraft list continuously
    Poll {
        /// Base URL, e.g. http://host:8080/VirtualRadar
        #[arg(long, env = "VRS_URL")]
        url: String,

        /// Output table file
        #[arg(short, long, default_value = "vrs.tab")]
        table: PathBuf,

        /// Poll interval in milliseconds
        #[arg(long, default_value = "3950")]
        interval_ms: u64,
    },

    /// Show statistics for a stored table file
    Stats {
        /// Table file
        table: PathBuf,

        /// Interpret the file as an aircraft-list table
        #[arg(long)]
        vrs: bool,
    },

    /// Replay a captured feed file through the merge pipeline
    Replay {
        /// Captured feed file
        file: PathBuf,

        /// Output table file
        #[arg(short, long, default_value = "sbs1.tab")]
        table: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Collect {
            host,
            port,
            table,
            flush_interval,
            status_interval,
        } => {
            run_feed_collector(FeedConfig {
                host,
                port,
                flush_interval: Duration::from_secs(flush_interval),
                status_interval: Duration::from_secs(status_interval),
                table_path: table,
                ..FeedConfig::default()
            })
            .await?;
        }

        Commands::Poll {
            url,
            table,
            interval_ms,
        } => {
            run_poll_collector(url, table, Duration::from_millis(interval_ms)).await?;
        }

        Commands::Stats { table, vrs } => {
            show_stats(&table, vrs)?;
        }

        Commands::Replay { file, table } => {
            replay_file(&file, table).await?;
        }
    }

    Ok(())
}

async fn run_feed_collector(config: FeedConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting SBS-1 feed collector");
    tracing::info!("Feed: {}:{}", config.host, config.port);
    tracing::info!("Table: {}", config.table_path.display());

    let collector = Arc::new(FeedCollector::new(config));
    let stats = collector.stats();

    // Ctrl+C requests a stop; the collector finishes with a final flush.
    let ctrl_c = {
        let collector = Arc::clone(&collector);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down...");
                collector.stop();
            }
        })
    };

    let result = collector.run().await;
    ctrl_c.abort();

    let final_stats = stats.snapshot();
    tracing::info!("Final statistics:");
    tracing::info!("  Bytes processed: {}", final_stats.bytes_processed);
    tracing::info!("  Records parsed: {}", final_stats.records_parsed);
    tracing::info!("  Entries merged: {}", final_stats.entries_merged);
    tracing::info!("  Flushes: {}", final_stats.flushes);
    tracing::info!("  Flush errors: {}", final_stats.flush_errors);

    result?;
    Ok(())
}

async fn run_poll_collector(
    url: String,
    table: PathBuf,
    poll_interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting aircraft-list poll collector");
    tracing::info!("Server: {url}");
    tracing::info!("Table: {}", table.display());

    let client = VrsClient::new(ClientConfig::new(url))?;
    let collector = Arc::new(VrsCollector::new(
        client,
        PollConfig {
            poll_interval,
            table_path: table,
        },
    ));
    let stats = collector.stats();

    let ctrl_c = {
        let collector = Arc::clone(&collector);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down...");
                collector.stop();
            }
        })
    };

    let result = collector.run().await;
    ctrl_c.abort();

    let final_stats = stats.snapshot();
    tracing::info!("Final statistics:");
    tracing::info!("  Polls: {}", final_stats.polls);
    tracing::info!("  Snapshots appended: {}", final_stats.snapshots_appended);
    tracing::info!("  Snapshots unchanged: {}", final_stats.snapshots_unchanged);
    tracing::info!("  Rows appended: {}", final_stats.rows_appended);
    tracing::info!("  Errors: {}", final_stats.errors);

    result?;
    Ok(())
}

fn show_stats(table: &PathBuf, vrs: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("Table Statistics");
    println!("================");
    println!("File: {}", table.display());

    let (rows, size, row_size) = if vrs {
        let store: TableStore<VrsRow> = TableStore::new(table);
        (store.row_count()?, store.file_size()?, VrsRow::SIZE)
    } else {
        let store: TableStore<SbsRow> = TableStore::new(table);
        (store.row_count()?, store.file_size()?, SbsRow::SIZE)
    };

    println!("Rows: {rows}");
    println!("Row size: {row_size} bytes");
    println!("File size: {:.2} MB", size as f64 / (1024.0 * 1024.0));

    Ok(())
}

async fn replay_file(file: &PathBuf, table: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Replaying {} into {}", file.display(), table.display());

    let collector = FeedCollector::new(FeedConfig {
        table_path: table,
        ..FeedConfig::default()
    });
    collector.replay(file).await?;

    let stats = collector.stats().snapshot();
    println!("Replay complete");
    println!("  Bytes processed: {}", stats.bytes_processed);
    println!("  Records parsed: {}", stats.records_parsed);
    println!("  Entries merged: {}", stats.entries_merged);

    Ok(())
}
