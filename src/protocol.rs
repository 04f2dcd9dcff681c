//! SBS-1 wire format: record reassembly and field-count validation.
//!
//! The feed is CRLF-terminated CSV. TCP hands us arbitrary chunks, so a
//! record (or a single field) can be split across reads. The splitter keeps
//! the unterminated tail of each chunk as a pending fragment and prepends it
//! to the next chunk as raw text before splitting, so a boundary that falls
//! mid-field reassembles that field intact.

use crate::types::FIELD_COUNT;
use tracing::debug;

/// Record terminator on the wire.
pub const RECORD_SEP: &str = "\r\n";

/// One validated 22-field SBS-1 record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Field 0: message class ("MSG", "SEL", "ID", ...).
    pub fn message_class(&self) -> &str {
        &self.fields[0]
    }

    /// Field 1: transmission-type tag, textual.
    pub fn transmission_type(&self) -> &str {
        &self.fields[1]
    }

    /// Field 4: hex aircraft identifier.
    pub fn hex_ident(&self) -> &str {
        &self.fields[4]
    }
}

/// Splits a chunked byte stream into validated records, carrying partial
/// records across chunk boundaries.
#[derive(Debug, Default)]
pub struct RecordSplitter {
    fragment: String,
}

impl RecordSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently pending unterminated text, if any.
    pub fn pending(&self) -> &str {
        &self.fragment
    }

    /// Feed one chunk, returning every record completed by it.
    ///
    /// Terminated pieces with the wrong field count are not errors: the
    /// piece is requeued as the pending fragment so the stream can
    /// re-synchronize against later input. The trailing unterminated piece
    /// is always held back, never validated in the same pass.
    pub fn push_chunk(&mut self, chunk: &str) -> Vec<Record> {
        let text = format!("{}{}", self.fragment, chunk);
        self.fragment.clear();

        let mut records = Vec::new();
        let pieces: Vec<&str> = text.split(RECORD_SEP).collect();
        let last = pieces.len() - 1;
        for (i, piece) in pieces.iter().enumerate() {
            if i == last {
                // Unterminated tail. An empty tail must not clobber a piece
                // requeued just above, or a malformed record at a chunk
                // boundary would vanish instead of re-synchronizing.
                if !piece.is_empty() {
                    self.fragment = piece.to_string();
                }
                continue;
            }
            let fields: Vec<String> = piece.split(',').map(str::to_string).collect();
            if fields.len() == FIELD_COUNT {
                records.push(Record { fields });
            } else {
                debug!(
                    got = fields.len(),
                    expected = FIELD_COUNT,
                    "requeueing record with unexpected field count"
                );
                self.fragment = piece.to_string();
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(class: &str, tag: &str, hex: &str) -> String {
        let mut fields = vec![String::new(); FIELD_COUNT];
        fields[0] = class.to_string();
        fields[1] = tag.to_string();
        fields[4] = hex.to_string();
        fields.join(",")
    }

    #[test]
    fn test_single_complete_record() {
        let mut splitter = RecordSplitter::new();
        let records = splitter.push_chunk(&format!("{}\r\n", line("MSG", "3", "ABC123")));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message_class(), "MSG");
        assert_eq!(records[0].hex_ident(), "ABC123");
        assert!(splitter.pending().is_empty());
    }

    #[test]
    fn test_fragment_carried_across_chunks() {
        let mut splitter = RecordSplitter::new();
        let full = format!("{}\r\n", line("MSG", "4", "DEF456"));
        let (head, tail) = full.split_at(10);

        assert!(splitter.push_chunk(head).is_empty());
        assert_eq!(splitter.pending(), head);

        let records = splitter.push_chunk(tail);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hex_ident(), "DEF456");
        assert!(splitter.pending().is_empty());
    }

    #[test]
    fn test_boundary_mid_field_reassembles() {
        let mut splitter = RecordSplitter::new();
        let full = format!("{}\r\n", line("MSG", "1", "ABCDEF"));
        // Split inside the hex identifier field.
        let cut = full.find("ABCDEF").map(|i| i + 3).unwrap_or(0);
        let (head, tail) = full.split_at(cut);

        assert!(splitter.push_chunk(head).is_empty());
        let records = splitter.push_chunk(tail);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hex_ident(), "ABCDEF");
    }

    #[test]
    fn test_chunk_boundary_invariance() {
        let stream = format!(
            "{}\r\n{}\r\n{}\r\n",
            line("MSG", "1", "AAA111"),
            line("MSG", "3", "BBB222"),
            line("MSG", "4", "CCC333"),
        );

        let mut whole = RecordSplitter::new();
        let expected = whole.push_chunk(&stream);
        assert_eq!(expected.len(), 3);

        // Every split point yields the same records.
        for cut in 1..stream.len() {
            let mut splitter = RecordSplitter::new();
            let mut records = splitter.push_chunk(&stream[..cut]);
            records.extend(splitter.push_chunk(&stream[cut..]));
            assert_eq!(records, expected, "divergence at cut {cut}");
        }
    }

    #[test]
    fn test_no_delimiter_becomes_fragment() {
        let mut splitter = RecordSplitter::new();
        assert!(splitter.push_chunk("MSG,3,1,1,ABC").is_empty());
        assert_eq!(splitter.pending(), "MSG,3,1,1,ABC");
    }

    #[test]
    fn test_wrong_arity_requeued_as_fragment() {
        let mut splitter = RecordSplitter::new();
        let records = splitter.push_chunk("MSG,3,too,short\r\n");
        assert!(records.is_empty());
        assert_eq!(splitter.pending(), "MSG,3,too,short");
    }

    #[test]
    fn test_requeued_piece_survives_empty_tail() {
        let mut splitter = RecordSplitter::new();
        // Chunk ends exactly on the separator; the malformed piece must
        // stay pending rather than be wiped by the empty tail.
        splitter.push_chunk("garbage,record\r\n");
        assert_eq!(splitter.pending(), "garbage,record");
    }

    #[test]
    fn test_valid_record_after_requeued_garbage() {
        let mut splitter = RecordSplitter::new();
        splitter.push_chunk("garbage\r\n");
        // The held garbage prefixes the next chunk; only the fresh record
        // that follows a separator comes out whole.
        let records = splitter.push_chunk(&format!("\r\n{}\r\n", line("MSG", "6", "DDD444")));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hex_ident(), "DDD444");
    }

    #[test]
    fn test_multiple_records_one_chunk() {
        let mut splitter = RecordSplitter::new();
        let chunk = format!(
            "{}\r\n{}\r\n",
            line("MSG", "1", "AAA111"),
            line("SEL", "", "AAA111"),
        );
        let records = splitter.push_chunk(&chunk);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message_class(), "MSG");
        assert_eq!(records[1].message_class(), "SEL");
    }
}
