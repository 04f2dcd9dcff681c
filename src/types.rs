//! Core data types for SBS-1 composite aircraft entries.

/// Number of comma-separated fields in a well-formed SBS-1 record.
pub const FIELD_COUNT: usize = 22;

/// Storage type of an output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Int,
    Float,
    Bool,
}

/// Output schema: column name, kind, and minimum persisted string width.
/// Non-text columns carry a width of 0.
pub const SCHEMA: [(&str, ColumnKind, usize); FIELD_COUNT] = [
    ("message_type", ColumnKind::Text, 8),
    ("transmission_type", ColumnKind::Text, 4),
    ("session_id", ColumnKind::Int, 0),
    ("aircraft_id", ColumnKind::Int, 0),
    ("hex_ident", ColumnKind::Text, 16),
    ("flight_id", ColumnKind::Int, 0),
    ("date_message_generated", ColumnKind::Text, 16),
    ("time_message_generated", ColumnKind::Text, 16),
    ("date_message_logged", ColumnKind::Text, 16),
    ("time_message_logged", ColumnKind::Text, 16),
    ("call_sign", ColumnKind::Text, 16),
    ("altitude", ColumnKind::Int, 0),
    ("ground_speed", ColumnKind::Float, 0),
    ("track", ColumnKind::Float, 0),
    ("latitude", ColumnKind::Float, 0),
    ("longitude", ColumnKind::Float, 0),
    ("vertical_rate", ColumnKind::Int, 0),
    ("squawk", ColumnKind::Int, 0),
    ("alert_squawk_change", ColumnKind::Bool, 0),
    ("emergency", ColumnKind::Bool, 0),
    ("spi_ident", ColumnKind::Bool, 0),
    ("is_on_ground", ColumnKind::Bool, 0),
];

/// Non-negative integer coercion for SBS-1 fields: all-digit strings parse,
/// anything else (empty, signed, fractional, junk) becomes -1.
pub fn sbs1_int(value: &str) -> i64 {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        value.parse().unwrap_or(-1)
    } else {
        -1
    }
}

/// Signed integer coercion with the same -1 sentinel on failure.
/// Altitude and vertical rate can legitimately be negative.
pub fn sbs1_signed(value: &str) -> i64 {
    value.trim().parse().unwrap_or(-1)
}

/// Float coercion, falling back to the declared 0.0 column default.
pub fn sbs1_float(value: &str) -> f64 {
    value.trim().parse().unwrap_or(0.0)
}

/// SBS-1 flag fields use "-1" as the set sentinel.
pub fn sbs1_flag(value: &str) -> bool {
    value == "-1"
}

/// One per-aircraft composite entry, accumulated from a run of MSG records
/// sharing a hex identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeEntry {
    pub message_type: String,
    pub transmission_type: String,
    pub session_id: i64,
    pub aircraft_id: i64,
    pub hex_ident: String,
    pub flight_id: i64,
    pub date_message_generated: String,
    pub time_message_generated: String,
    pub date_message_logged: String,
    pub time_message_logged: String,
    pub call_sign: String,
    pub altitude: i64,
    pub ground_speed: f64,
    pub track: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub vertical_rate: i64,
    pub squawk: i64,
    pub alert_squawk_change: bool,
    pub emergency: bool,
    pub spi_ident: bool,
    pub is_on_ground: bool,
    /// Number of records folded into this entry.
    pub n_messages: u32,
    /// Transmission-type tags observed, in arrival order, duplicates kept.
    pub seen_types: Vec<i64>,
}

impl CompositeEntry {
    /// Entry with every column at its declared default.
    pub fn empty() -> Self {
        Self {
            message_type: String::new(),
            // Composite rows carry a fixed sentinel instead of any one tag.
            transmission_type: "0".to_string(),
            session_id: -1,
            aircraft_id: -1,
            hex_ident: String::new(),
            flight_id: -1,
            date_message_generated: String::new(),
            time_message_generated: String::new(),
            date_message_logged: String::new(),
            time_message_logged: String::new(),
            call_sign: String::new(),
            altitude: -1,
            ground_speed: 0.0,
            track: 0.0,
            latitude: 0.0,
            longitude: 0.0,
            vertical_rate: -1,
            squawk: -1,
            alert_squawk_change: false,
            emergency: false,
            spi_ident: false,
            is_on_ground: false,
            n_messages: 0,
            seen_types: Vec::new(),
        }
    }

    /// Start a new entry from the first record of a run.
    pub fn new(fields: &[String]) -> Self {
        let mut entry = Self::empty();
        entry.message_type = fields[0].clone();
        entry.hex_ident = fields[4].clone();
        entry.fold(fields);
        entry
    }

    /// Fold one record's populated fields into the entry. Which fields a
    /// record populates depends on its transmission-type tag; unknown tags
    /// fold nothing but still count toward the observed set.
    pub fn fold(&mut self, fields: &[String]) {
        let tag = fields[1].trim().parse::<i64>().unwrap_or(-1);
        self.n_messages += 1;
        self.seen_types.push(tag);
        match tag {
            1 => {
                self.call_sign = fields[10].clone();
            }
            3 => {
                self.altitude = sbs1_signed(&fields[11]);
                self.latitude = sbs1_float(&fields[14]);
                self.longitude = sbs1_float(&fields[15]);
                self.alert_squawk_change = sbs1_flag(&fields[18]);
                self.emergency = sbs1_flag(&fields[19]);
                self.spi_ident = sbs1_flag(&fields[20]);
                self.is_on_ground = sbs1_flag(&fields[21]);
            }
            4 => {
                self.ground_speed = sbs1_float(&fields[12]);
                self.track = sbs1_float(&fields[13]);
                self.vertical_rate = sbs1_signed(&fields[16]);
            }
            6 => {
                self.altitude = sbs1_signed(&fields[11]);
                self.squawk = sbs1_int(&fields[17]);
                self.alert_squawk_change = sbs1_flag(&fields[18]);
                self.emergency = sbs1_flag(&fields[19]);
                self.spi_ident = sbs1_flag(&fields[20]);
                self.is_on_ground = sbs1_flag(&fields[21]);
            }
            _ => {}
        }
    }

    /// Approximate heap + inline size in bytes, for the status report.
    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.message_type.capacity()
            + self.transmission_type.capacity()
            + self.hex_ident.capacity()
            + self.date_message_generated.capacity()
            + self.time_message_generated.capacity()
            + self.date_message_logged.capacity()
            + self.time_message_logged.capacity()
            + self.call_sign.capacity()
            + self.seen_types.capacity() * std::mem::size_of::<i64>()
    }
}
