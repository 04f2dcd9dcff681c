//! Columnar table files with fixed-width rows.
//!
//! # Storage Format
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │ Header (64 bytes)                    │
//! │  - Magic: "SQTR-TAB"                │
//! │  - Version: u32                      │
//! │  - Row size: u32                     │
//! │  - Row count: u64                    │
//! │  - Reserved                          │
//! ├─────────────────────────────────────┤
//! │ Rows (row_size bytes each)           │
//! └─────────────────────────────────────┘
//! ```
//!
//! Every column has a fixed width, so row N lives at a computable offset
//! and a reader never needs an index. Text columns are null-padded byte
//! arrays sized to the declared minimum string widths; longer values are
//! truncated at encode time.

use crate::types::CompositeEntry;
use bytemuck::{Pod, Zeroable};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid file format")]
    InvalidFormat,
    #[error("Version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },
    #[error("Row size mismatch: expected {expected}, got {got}")]
    RowSizeMismatch { expected: u32, got: u32 },
    #[error("File truncated: {len} bytes is not a whole number of rows")]
    Truncated { len: u64 },
}

const TABLE_MAGIC: &[u8; 8] = b"SQTR-TAB";
const CURRENT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct TableHeader {
    magic: [u8; 8],
    version: u32,
    row_size: u32,
    row_count: u64,
    _reserved: [u8; 40],
}

impl TableHeader {
    fn new<R>(row_count: u64) -> Self {
        Self {
            magic: *TABLE_MAGIC,
            version: CURRENT_VERSION,
            row_size: std::mem::size_of::<R>() as u32,
            row_count,
            _reserved: [0; 40],
        }
    }
}

/// Copy a string into a null-padded fixed-width column, truncating on a
/// UTF-8 boundary if it does not fit.
pub fn pack_str(dst: &mut [u8], src: &str) {
    let mut end = src.len().min(dst.len());
    while end > 0 && !src.is_char_boundary(end) {
        end -= 1;
    }
    dst[..end].copy_from_slice(&src.as_bytes()[..end]);
}

/// Read a null-padded fixed-width column back into a string.
pub fn unpack_str(src: &[u8]) -> String {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}

/// A table file of fixed-width `R` rows at a known path.
#[derive(Debug)]
pub struct TableStore<R> {
    path: PathBuf,
    _row: PhantomData<R>,
}

impl<R: Pod + Zeroable> TableStore<R> {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            _row: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the table contents with `rows` (truncate and rewrite).
    pub fn put(&self, rows: &[R]) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        self.write_all(&mut file, rows, rows.len() as u64)?;
        file.sync_all()?;
        Ok(())
    }

    /// Append `rows`, creating the file with a fresh header if absent.
    pub fn append(&self, rows: &[R]) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        let existing = if file.metadata()?.len() == 0 {
            let header = TableHeader::new::<R>(0);
            file.write_all(bytemuck::bytes_of(&header))?;
            0
        } else {
            self.read_header(&mut file)?.row_count
        };

        file.seek(SeekFrom::End(0))?;
        for row in rows {
            file.write_all(bytemuck::bytes_of(row))?;
        }

        let header = TableHeader::new::<R>(existing + rows.len() as u64);
        file.seek(SeekFrom::Start(0))?;
        file.write_all(bytemuck::bytes_of(&header))?;
        file.sync_all()?;
        Ok(())
    }

    /// Read every row back.
    pub fn read_all(&self) -> Result<Vec<R>, StoreError> {
        let mut file = File::open(&self.path)?;
        let header = self.read_header(&mut file)?;

        let row_size = std::mem::size_of::<R>();
        let data_len = file.metadata()?.len() - HEADER_SIZE as u64;
        if data_len % row_size as u64 != 0 {
            return Err(StoreError::Truncated {
                len: file.metadata()?.len(),
            });
        }

        let mut rows = Vec::with_capacity(header.row_count as usize);
        let mut buf = vec![0u8; row_size];
        for _ in 0..header.row_count {
            file.read_exact(&mut buf)?;
            rows.push(*bytemuck::from_bytes(&buf));
        }
        Ok(rows)
    }

    /// Number of rows recorded in the header, 0 if the file is absent.
    pub fn row_count(&self) -> Result<u64, StoreError> {
        match File::open(&self.path) {
            Ok(mut file) => Ok(self.read_header(&mut file)?.row_count),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// On-disk size in bytes, 0 if the file is absent.
    pub fn file_size(&self) -> Result<u64, StoreError> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, file: &mut File, rows: &[R], count: u64) -> Result<(), StoreError> {
        let header = TableHeader::new::<R>(count);
        file.write_all(bytemuck::bytes_of(&header))?;
        for row in rows {
            file.write_all(bytemuck::bytes_of(row))?;
        }
        Ok(())
    }

    fn read_header(&self, file: &mut File) -> Result<TableHeader, StoreError> {
        let mut buf = [0u8; HEADER_SIZE];
        file.read_exact(&mut buf)?;
        let header: TableHeader = *bytemuck::from_bytes(&buf);
        if header.magic != *TABLE_MAGIC {
            return Err(StoreError::InvalidFormat);
        }
        if header.version != CURRENT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: CURRENT_VERSION,
                got: header.version,
            });
        }
        let row_size = std::mem::size_of::<R>() as u32;
        if header.row_size != row_size {
            return Err(StoreError::RowSizeMismatch {
                expected: row_size,
                got: header.row_size,
            });
        }
        Ok(header)
    }
}

/// Persisted SBS-1 composite row.
/// Total size: 192 bytes (8-byte fields first, no padding needed).
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct SbsRow {
    // === 8-byte aligned section (offset 0) ===
    pub session_id: i64,
    pub aircraft_id: i64,
    pub flight_id: i64,
    pub altitude: i64,
    pub vertical_rate: i64,
    pub squawk: i64,
    pub ground_speed: f64,
    pub track: f64,
    pub latitude: f64,
    pub longitude: f64,

    // === Byte arrays (offset 80) ===
    pub message_type: [u8; 8],
    pub transmission_type: [u8; 4],
    pub hex_ident: [u8; 16],
    pub date_message_generated: [u8; 16],
    pub time_message_generated: [u8; 16],
    pub date_message_logged: [u8; 16],
    pub time_message_logged: [u8; 16],
    pub call_sign: [u8; 16],

    // === Flags (offset 188) ===
    pub alert_squawk_change: u8,
    pub emergency: u8,
    pub spi_ident: u8,
    pub is_on_ground: u8,
}

impl SbsRow {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Coerce one in-memory entry to its persisted columnar form.
    pub fn from_entry(entry: &CompositeEntry) -> Self {
        let mut row = Self::zeroed();
        row.session_id = entry.session_id;
        row.aircraft_id = entry.aircraft_id;
        row.flight_id = entry.flight_id;
        row.altitude = entry.altitude;
        row.vertical_rate = entry.vertical_rate;
        row.squawk = entry.squawk;
        row.ground_speed = entry.ground_speed;
        row.track = entry.track;
        row.latitude = entry.latitude;
        row.longitude = entry.longitude;
        pack_str(&mut row.message_type, &entry.message_type);
        pack_str(&mut row.transmission_type, &entry.transmission_type);
        pack_str(&mut row.hex_ident, &entry.hex_ident);
        pack_str(&mut row.date_message_generated, &entry.date_message_generated);
        pack_str(&mut row.time_message_generated, &entry.time_message_generated);
        pack_str(&mut row.date_message_logged, &entry.date_message_logged);
        pack_str(&mut row.time_message_logged, &entry.time_message_logged);
        pack_str(&mut row.call_sign, &entry.call_sign);
        row.alert_squawk_change = entry.alert_squawk_change as u8;
        row.emergency = entry.emergency as u8;
        row.spi_ident = entry.spi_ident as u8;
        row.is_on_ground = entry.is_on_ground as u8;
        row
    }

    pub fn hex_ident_str(&self) -> String {
        unpack_str(&self.hex_ident)
    }

    pub fn call_sign_str(&self) -> String {
        unpack_str(&self.call_sign)
    }
}
