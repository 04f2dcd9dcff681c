//! Merge engine: folds runs of MSG records into per-aircraft composite
//! entries.
//!
//! The feed interleaves transmission-type subtypes for one aircraft as a
//! contiguous run of records sharing a hex identifier. A run is complete
//! when a record for a different identifier arrives, so completion is
//! always detected one record late.

use crate::protocol::Record;
use crate::types::CompositeEntry;
use tracing::trace;

/// Message class whose records are merged. Everything else only advances
/// the last-seen identifier.
const MERGED_CLASS: &str = "MSG";

/// Tag multisets that make a composite entry persistable. Sorted, with
/// duplicates significant.
const VALID_MESSAGE_SETS: [&[i64]; 2] = [&[1, 2, 6], &[1, 3, 4, 6]];

/// State machine tracking the current in-flight entry and the identifier
/// of the most recent record of any class.
#[derive(Debug, Default)]
pub struct MergeEngine {
    last_seen: Option<String>,
    current: Option<CompositeEntry>,
}

impl MergeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one validated record. Returns a completed entry when this
    /// record closes out the previous run and that run's observed tags
    /// form a valid set; incomplete runs are dropped silently.
    ///
    /// The last-seen identifier advances for every record class, so
    /// intervening non-MSG traffic for another aircraft still registers as
    /// an identifier change and ends the run in flight.
    pub fn process(&mut self, record: &Record) -> Option<CompositeEntry> {
        let hex = record.hex_ident();
        let changed = self.last_seen.as_deref() != Some(hex);
        self.last_seen = Some(hex.to_string());

        if record.message_class() != MERGED_CLASS {
            return None;
        }

        match self.current.as_mut() {
            Some(entry) if !changed && entry.hex_ident == hex => {
                entry.fold(record.fields());
                None
            }
            Some(_) => {
                let finished = self.current.take();
                self.current = Some(CompositeEntry::new(record.fields()));
                finished.and_then(Self::complete)
            }
            // No run in flight for this identifier (e.g. the previous
            // record was a non-MSG class): start one.
            None => {
                self.current = Some(CompositeEntry::new(record.fields()));
                None
            }
        }
    }

    /// Emit the in-flight entry at end of stream, subject to the same
    /// tag-set check as identifier-change completion.
    pub fn finish(&mut self) -> Option<CompositeEntry> {
        self.current.take().and_then(Self::complete)
    }

    fn complete(entry: CompositeEntry) -> Option<CompositeEntry> {
        let mut tags = entry.seen_types.clone();
        tags.sort_unstable();
        if VALID_MESSAGE_SETS.iter().any(|set| tags == *set) {
            Some(entry)
        } else {
            trace!(hex = %entry.hex_ident, ?tags, "dropping incomplete entry");
            None
        }
    }
}
