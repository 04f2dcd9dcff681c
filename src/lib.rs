//! SBS-1 feed collector and columnar table archiver.
//!
//! This library provides functionality to:
//! - Reassemble an SBS-1 BaseStation byte stream into CSV records
//! - Merge transmission-type subtypes into per-aircraft composite entries
//! - Accumulate entries in a shared table and flush them periodically to a
//!   fixed-width columnar table file
//! - Poll a Virtual Radar Server aircraft list into a second table
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  Splitter   │───▶│    Merge    │───▶│ SharedTable │
//! │  (records)  │    │  (entries)  │    │   (mutex)   │
//! └─────────────┘    └─────────────┘    └─────────────┘
//!        ▲                                     │ flush
//!        │                                     ▼
//! ┌─────────────┐                      ┌─────────────┐
//! │ FeedCollector│◀── TCP feed         │  TableStore │
//! │(orchestrator)│                     │   (file)    │
//! └─────────────┘                      └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use squitter::collector::{FeedCollector, FeedConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let collector = FeedCollector::new(FeedConfig {
//!         host: "radar.local".to_string(),
//!         ..FeedConfig::default()
//!     });
//!
//!     collector.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod collector;
pub mod merge;
pub mod protocol;
pub mod storage;
pub mod table;
pub mod types;
pub mod vrs;
pub mod vrs_collector;

pub use client::{ClientConfig, VrsClient};
pub use collector::{FeedCollector, FeedConfig};
pub use merge::MergeEngine;
pub use protocol::{Record, RecordSplitter};
pub use storage::{SbsRow, TableStore};
pub use table::SharedTable;
pub use types::CompositeEntry;
pub use vrs::{VrsAircraft, VrsDocument, VrsRow};
pub use vrs_collector::{PollConfig, VrsCollector};
