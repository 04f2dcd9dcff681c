//! In-memory accumulation table shared between the ingestion loop and the
//! flush task.
//!
//! One exclusive, non-recursive lock guards the entry buffer. Ingestion
//! holds it only to append; the flush path holds it across coercion and
//! serialization so a flush observes a consistent snapshot. The status task
//! never takes the lock, it reads a relaxed byte counter instead.

use crate::types::CompositeEntry;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SharedTable {
    entries: Mutex<Vec<CompositeEntry>>,
    approx_bytes: AtomicU64,
}

impl SharedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one completed entry.
    pub fn push(&self, entry: CompositeEntry) {
        let size = entry.approx_size() as u64;
        self.entries.lock().push(entry);
        self.approx_bytes.fetch_add(size, Ordering::Relaxed);
    }

    /// Number of accumulated entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Approximate in-memory size in bytes. Lock-free; may lag the buffer
    /// by in-flight appends, which is fine for a periodic report.
    pub fn approx_mem_bytes(&self) -> u64 {
        self.approx_bytes.load(Ordering::Relaxed)
    }

    /// Run `f` over the full buffer under the lock. Appends arriving during
    /// the call wait; they are picked up by the next flush cycle.
    pub fn with_entries<T>(&self, f: impl FnOnce(&[CompositeEntry]) -> T) -> T {
        let entries = self.entries.lock();
        f(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompositeEntry, FIELD_COUNT};
    use std::sync::Arc;

    fn entry(hex: &str) -> CompositeEntry {
        let mut fields = vec![String::new(); FIELD_COUNT];
        fields[0] = "MSG".to_string();
        fields[1] = "1".to_string();
        fields[4] = hex.to_string();
        CompositeEntry::new(&fields)
    }

    #[test]
    fn test_push_and_len() {
        let table = SharedTable::new();
        assert!(table.is_empty());
        table.push(entry("AAA111"));
        table.push(entry("BBB222"));
        assert_eq!(table.len(), 2);
        assert!(table.approx_mem_bytes() > 0);
    }

    #[test]
    fn test_with_entries_sees_snapshot() {
        let table = SharedTable::new();
        table.push(entry("AAA111"));
        let hexes = table.with_entries(|entries| {
            entries.iter().map(|e| e.hex_ident.clone()).collect::<Vec<_>>()
        });
        assert_eq!(hexes, vec!["AAA111"]);
    }

    #[test]
    fn test_size_reads_leave_table_unchanged() {
        let table = SharedTable::new();
        table.push(entry("AAA111"));
        let first = table.approx_mem_bytes();
        assert_eq!(table.approx_mem_bytes(), first);
        assert_eq!(table.approx_mem_bytes(), first);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_concurrent_appends_all_land() {
        let table = Arc::new(SharedTable::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let table = Arc::clone(&table);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    table.push(entry(&format!("{t:02}{i:04}")));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(table.len(), 400);
    }
}
