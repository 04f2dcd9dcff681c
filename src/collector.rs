//! Continuous feed collection orchestrator.
//!
//! Owns the TCP read loop and the two timer-driven companions: the flush
//! task that persists the accumulated table and the status task that
//! reports sizes. Both run until the collector is stopped; stopping always
//! ends with a final best-effort flush that includes the in-flight
//! composite entry.

use crate::merge::MergeEngine;
use crate::protocol::RecordSplitter;
use crate::storage::{SbsRow, StoreError, TableStore};
use crate::table::SharedTable;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::Notify;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Statistics for the feed collector.
#[derive(Debug, Default)]
pub struct FeedStats {
    pub bytes_processed: AtomicU64,
    pub records_parsed: AtomicU64,
    pub entries_merged: AtomicU64,
    pub flushes: AtomicU64,
    pub flush_errors: AtomicU64,
}

impl FeedStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> FeedStatsSnapshot {
        FeedStatsSnapshot {
            bytes_processed: self.bytes_processed.load(Ordering::Relaxed),
            records_parsed: self.records_parsed.load(Ordering::Relaxed),
            entries_merged: self.entries_merged.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flush_errors: self.flush_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedStatsSnapshot {
    pub bytes_processed: u64,
    pub records_parsed: u64,
    pub entries_merged: u64,
    pub flushes: u64,
    pub flush_errors: u64,
}

/// Configuration for the feed collector.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Feed host.
    pub host: String,
    /// SBS-1 BaseStation output port.
    pub port: u16,
    /// Socket read buffer size in bytes.
    pub read_buffer: usize,
    /// Interval between table flushes.
    pub flush_interval: Duration,
    /// Interval between size reports.
    pub status_interval: Duration,
    /// Output table file.
    pub table_path: PathBuf,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 30004,
            read_buffer: 4096,
            flush_interval: Duration::from_secs(30),
            status_interval: Duration::from_secs(45),
            table_path: PathBuf::from("sbs1.tab"),
        }
    }
}

/// The main collector that orchestrates ingestion and persistence.
pub struct FeedCollector {
    config: FeedConfig,
    table: Arc<SharedTable>,
    store: Arc<TableStore<SbsRow>>,
    stats: Arc<FeedStats>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl FeedCollector {
    pub fn new(config: FeedConfig) -> Self {
        let store = Arc::new(TableStore::new(&config.table_path));
        Self {
            config,
            table: Arc::new(SharedTable::new()),
            store,
            stats: Arc::new(FeedStats::new()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn stats(&self) -> Arc<FeedStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Request a stop. The read loop wakes, performs a final flush, and
    /// `run` returns.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    /// Connect to the feed and collect until the stream closes or `stop`
    /// is called. Transport failures propagate after the final flush.
    pub async fn run(&self) -> Result<(), FeedError> {
        self.running.store(true, Ordering::SeqCst);

        let addr = format!("{}:{}", self.config.host, self.config.port);
        tracing::info!(%addr, "connecting to SBS-1 feed");
        let mut stream = TcpStream::connect(&addr).await?;

        let flush_handle = self.spawn_flush_task();
        let status_handle = self.spawn_status_task();

        let mut splitter = RecordSplitter::new();
        let mut engine = MergeEngine::new();
        let mut buf = vec![0u8; self.config.read_buffer];

        let read_result = loop {
            if !self.running.load(Ordering::Relaxed) {
                break Ok(());
            }
            let n = tokio::select! {
                res = stream.read(&mut buf) => match res {
                    Ok(0) => {
                        tracing::info!("feed closed the connection");
                        break Ok(());
                    }
                    Ok(n) => n,
                    Err(e) => break Err(e),
                },
                _ = self.shutdown.notified() => break Ok(()),
            };
            let chunk = String::from_utf8_lossy(&buf[..n]);
            self.process_chunk(&mut splitter, &mut engine, &chunk);
        };

        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
        let _ = flush_handle.await;
        let _ = status_handle.await;

        self.finalize(&mut engine);
        read_result.map_err(FeedError::from)
    }

    /// Replay a captured feed file through the same pipeline, reading it
    /// in socket-sized chunks, then flush once.
    pub async fn replay(&self, path: &std::path::Path) -> Result<(), FeedError> {
        let data = tokio::fs::read(path).await?;
        let text = String::from_utf8_lossy(&data);

        let mut splitter = RecordSplitter::new();
        let mut engine = MergeEngine::new();
        let mut offset = 0;
        while offset < text.len() {
            let mut end = (offset + self.config.read_buffer).min(text.len());
            while end < text.len() && !text.is_char_boundary(end) {
                end += 1;
            }
            self.process_chunk(&mut splitter, &mut engine, &text[offset..end]);
            offset = end;
        }

        if let Some(entry) = engine.finish() {
            self.stats.entries_merged.fetch_add(1, Ordering::Relaxed);
            self.table.push(entry);
        }
        self.flush()?;
        Ok(())
    }

    fn process_chunk(&self, splitter: &mut RecordSplitter, engine: &mut MergeEngine, chunk: &str) {
        self.stats
            .bytes_processed
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        for record in splitter.push_chunk(chunk) {
            self.stats.records_parsed.fetch_add(1, Ordering::Relaxed);
            if let Some(entry) = engine.process(&record) {
                tracing::debug!(hex = %entry.hex_ident, n = entry.n_messages, "entry complete");
                self.stats.entries_merged.fetch_add(1, Ordering::Relaxed);
                self.table.push(entry);
            }
        }
    }

    /// Persist the full accumulated table. Holds the table lock across
    /// coercion and serialization; on failure memory is untouched, so the
    /// next cycle retries with the same entries plus newer appends.
    pub fn flush(&self) -> Result<(), StoreError> {
        let result = self.table.with_entries(|entries| {
            let rows: Vec<SbsRow> = entries.iter().map(SbsRow::from_entry).collect();
            self.store.put(&rows)
        });
        match &result {
            Ok(()) => {
                self.stats.flushes.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(entries = self.table.len(), "flushed table");
            }
            Err(e) => {
                self.stats.flush_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!("flush error: {e}");
            }
        }
        result
    }

    fn finalize(&self, engine: &mut MergeEngine) {
        if let Some(entry) = engine.finish() {
            self.stats.entries_merged.fetch_add(1, Ordering::Relaxed);
            self.table.push(entry);
        }
        if let Err(e) = self.flush() {
            tracing::error!("final flush failed: {e}");
        }
    }

    fn spawn_flush_task(&self) -> tokio::task::JoinHandle<()> {
        let table = Arc::clone(&self.table);
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let running = Arc::clone(&self.running);
        let shutdown = Arc::clone(&self.shutdown);
        let flush_interval = self.config.flush_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(flush_interval);
            interval.tick().await; // first tick fires immediately
            while running.load(Ordering::Relaxed) {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown.notified() => break,
                }
                let result = table.with_entries(|entries| {
                    let rows: Vec<SbsRow> = entries.iter().map(SbsRow::from_entry).collect();
                    store.put(&rows)
                });
                match result {
                    Ok(()) => {
                        stats.flushes.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!("flushed table");
                    }
                    Err(e) => {
                        stats.flush_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::error!("flush error: {e}");
                    }
                }
            }
        })
    }

    fn spawn_status_task(&self) -> tokio::task::JoinHandle<()> {
        let table = Arc::clone(&self.table);
        let store = Arc::clone(&self.store);
        let running = Arc::clone(&self.running);
        let shutdown = Arc::clone(&self.shutdown);
        let status_interval = self.config.status_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(status_interval);
            interval.tick().await;
            while running.load(Ordering::Relaxed) {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown.notified() => break,
                }
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                // No table lock here: a periodic report tolerates a stale
                // estimate.
                let mem = table.approx_mem_bytes();
                let disk = store.file_size().unwrap_or(0);
                tracing::info!(
                    mem_bytes = mem,
                    disk_bytes = disk,
                    "table size report"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FIELD_COUNT;
    use tempfile::tempdir;

    fn line(tag: &str, hex: &str) -> String {
        let mut fields = vec![String::new(); FIELD_COUNT];
        fields[0] = "MSG".to_string();
        fields[1] = tag.to_string();
        fields[4] = hex.to_string();
        format!("{}\r\n", fields.join(","))
    }

    fn config(dir: &std::path::Path) -> FeedConfig {
        FeedConfig {
            table_path: dir.join("sbs1.tab"),
            ..FeedConfig::default()
        }
    }

    #[test]
    fn test_default_config_matches_feed_conventions() {
        let config = FeedConfig::default();
        assert_eq!(config.port, 30004);
        assert_eq!(config.read_buffer, 4096);
        assert_eq!(config.flush_interval, Duration::from_secs(30));
        assert_eq!(config.status_interval, Duration::from_secs(45));
    }

    #[tokio::test]
    async fn test_replay_merges_and_persists() {
        let dir = tempdir().unwrap();
        let feed = format!(
            "{}{}{}{}",
            line("1", "AAA111"),
            line("2", "AAA111"),
            line("6", "AAA111"),
            line("1", "BBB222"),
        );
        let feed_path = dir.path().join("capture.sbs");
        std::fs::write(&feed_path, &feed).unwrap();

        let collector = FeedCollector::new(config(dir.path()));
        collector.replay(&feed_path).await.unwrap();

        // AAA111 completes on the identifier change; BBB222's lone tag 1
        // is an invalid set even at finish, so only one row persists.
        let rows = collector.store.read_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hex_ident_str(), "AAA111");

        let stats = collector.stats().snapshot();
        assert_eq!(stats.records_parsed, 4);
        assert_eq!(stats.entries_merged, 1);
        assert_eq!(stats.flushes, 1);
    }

    #[tokio::test]
    async fn test_replay_finish_emits_trailing_entry() {
        let dir = tempdir().unwrap();
        let feed = format!(
            "{}{}{}",
            line("1", "AAA111"),
            line("2", "AAA111"),
            line("6", "AAA111"),
        );
        let feed_path = dir.path().join("capture.sbs");
        std::fs::write(&feed_path, &feed).unwrap();

        let collector = FeedCollector::new(config(dir.path()));
        collector.replay(&feed_path).await.unwrap();

        let rows = collector.store.read_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hex_ident_str(), "AAA111");
    }

    #[tokio::test]
    async fn test_flush_rewrites_full_table() {
        let dir = tempdir().unwrap();
        let collector = FeedCollector::new(config(dir.path()));

        let mut splitter = RecordSplitter::new();
        let mut engine = MergeEngine::new();
        let run = |hex: &str| {
            format!(
                "{}{}{}",
                line("1", hex),
                line("2", hex),
                line("6", hex),
            )
        };
        collector.process_chunk(&mut splitter, &mut engine, &run("AAA111"));
        collector.process_chunk(&mut splitter, &mut engine, &line("1", "ZZZ000"));
        collector.flush().unwrap();
        assert_eq!(collector.store.read_all().unwrap().len(), 1);

        collector.process_chunk(&mut splitter, &mut engine, &run("BBB222"));
        collector.process_chunk(&mut splitter, &mut engine, &line("1", "YYY000"));
        collector.flush().unwrap();

        // Second flush carries both entries: full rewrite, no loss, no
        // duplication.
        let rows = collector.store.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].hex_ident_str(), "AAA111");
        assert_eq!(rows[1].hex_ident_str(), "BBB222");
    }

    #[tokio::test]
    async fn test_live_run_against_local_listener() {
        use tokio::io::AsyncWriteExt;
        use tokio::net::TcpListener;

        let dir = tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let feed = format!(
            "{}{}{}{}",
            line("1", "AAA111"),
            line("2", "AAA111"),
            line("6", "AAA111"),
            line("1", "BBB222"),
        );
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            // Write in two arbitrary chunks, then close.
            let bytes = feed.as_bytes();
            sock.write_all(&bytes[..17]).await.unwrap();
            sock.write_all(&bytes[17..]).await.unwrap();
        });

        let collector = FeedCollector::new(FeedConfig {
            port,
            table_path: dir.path().join("sbs1.tab"),
            ..FeedConfig::default()
        });
        collector.run().await.unwrap();

        let rows = collector.store.read_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hex_ident_str(), "AAA111");
    }
}
