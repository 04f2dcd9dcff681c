//! Aircraft-list polling orchestrator.
//!
//! Unlike the socket collector, this path is pull-based: each poll fetches
//! the full aircraft list, and the document's version token tells us
//! whether the server has produced a new snapshot since the last one we
//! persisted. Unchanged snapshots are skipped, so the appended table never
//! carries duplicate versions.

use crate::client::{ClientError, VrsClient};
use crate::storage::{StoreError, TableStore};
use crate::vrs::{VrsDocument, VrsRow};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Client error: {0}")]
    Client(#[from] ClientError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Statistics for the poll collector.
#[derive(Debug, Default)]
pub struct PollStats {
    pub polls: AtomicU64,
    pub snapshots_appended: AtomicU64,
    pub snapshots_unchanged: AtomicU64,
    pub rows_appended: AtomicU64,
    pub errors: AtomicU64,
    pub last_poll_ms: AtomicU64,
}

impl PollStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PollStatsSnapshot {
        PollStatsSnapshot {
            polls: self.polls.load(Ordering::Relaxed),
            snapshots_appended: self.snapshots_appended.load(Ordering::Relaxed),
            snapshots_unchanged: self.snapshots_unchanged.load(Ordering::Relaxed),
            rows_appended: self.rows_appended.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_poll_ms: self.last_poll_ms.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollStatsSnapshot {
    pub polls: u64,
    pub snapshots_appended: u64,
    pub snapshots_unchanged: u64,
    pub rows_appended: u64,
    pub errors: u64,
    pub last_poll_ms: u64,
}

/// Configuration for the poll collector.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Interval between polls.
    pub poll_interval: Duration,
    /// Output table file.
    pub table_path: PathBuf,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            // The feed refreshes about every four seconds.
            poll_interval: Duration::from_millis(3950),
            table_path: PathBuf::from("vrs.tab"),
        }
    }
}

/// Poll collector that appends aircraft-list snapshots to a table file.
pub struct VrsCollector {
    client: VrsClient,
    store: TableStore<VrsRow>,
    config: PollConfig,
    stats: Arc<PollStats>,
    running: Arc<AtomicBool>,
    last_token: parking_lot::Mutex<Option<String>>,
}

impl VrsCollector {
    pub fn new(client: VrsClient, config: PollConfig) -> Self {
        let store = TableStore::new(&config.table_path);
        Self {
            client,
            store,
            config,
            stats: Arc::new(PollStats::new()),
            running: Arc::new(AtomicBool::new(false)),
            last_token: parking_lot::Mutex::new(None),
        }
    }

    pub fn stats(&self) -> Arc<PollStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Poll until stopped. Fetch and write errors back off exponentially
    /// and never terminate the loop.
    pub async fn run(&self) -> Result<(), PollError> {
        self.running.store(true, Ordering::SeqCst);

        let mut interval = tokio::time::interval(self.config.poll_interval);
        let mut backoff = Duration::from_secs(1);
        const MAX_BACKOFF: Duration = Duration::from_secs(60);

        while self.running.load(Ordering::Relaxed) {
            interval.tick().await;

            let start = Instant::now();
            let token = self.last_token.lock().clone();
            match self.client.fetch(token.as_deref()).await {
                Ok(doc) => {
                    self.stats.polls.fetch_add(1, Ordering::Relaxed);
                    self.stats
                        .last_poll_ms
                        .store(start.elapsed().as_millis() as u64, Ordering::Relaxed);

                    match self.ingest(&doc) {
                        Ok(appended) => {
                            if appended > 0 {
                                tracing::debug!(rows = appended, "appended snapshot");
                            }
                            backoff = Duration::from_secs(1);
                        }
                        Err(e) => {
                            tracing::error!("append error: {e}");
                            self.stats.errors.fetch_add(1, Ordering::Relaxed);
                            sleep(backoff).await;
                            backoff = (backoff * 2).min(MAX_BACKOFF);
                        }
                    }
                }
                Err(ClientError::RateLimited { retry_after }) => {
                    let wait = retry_after.unwrap_or(backoff);
                    tracing::warn!("rate limited, waiting {wait:?}");
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    sleep(wait).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(e) => {
                    tracing::error!("poll error: {e}");
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        Ok(())
    }

    /// Append one document if its version token is new. Returns the number
    /// of rows appended; 0 means an unchanged snapshot. The token advances
    /// only after a successful append, so a failed write retries the same
    /// snapshot on the next poll.
    pub fn ingest(&self, doc: &VrsDocument) -> Result<usize, StoreError> {
        let token = doc.version_token();
        if token.is_some() && token == *self.last_token.lock() {
            self.stats.snapshots_unchanged.fetch_add(1, Ordering::Relaxed);
            return Ok(0);
        }

        let rows: Vec<VrsRow> = doc.ac_list.iter().map(VrsRow::from_aircraft).collect();
        self.store.append(&rows)?;

        *self.last_token.lock() = token;
        self.stats.snapshots_appended.fetch_add(1, Ordering::Relaxed);
        self.stats
            .rows_appended
            .fetch_add(rows.len() as u64, Ordering::Relaxed);
        tracing::info!(
            rows = rows.len(),
            disk_bytes = self.store.file_size().unwrap_or(0),
            "saved aircraft-list snapshot"
        );
        Ok(rows.len())
    }
}
