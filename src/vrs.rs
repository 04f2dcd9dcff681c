//! Virtual Radar Server aircraft-list schema.
//!
//! The `AircraftList.json` document carries a version token (`lastDv`), a
//! total count, and an `acList` array whose members omit any field the
//! server has no value for. Normalization fills the declared defaults,
//! caps string lengths, and coerces every field to its persisted column
//! type.

use crate::storage::{pack_str, unpack_str};
use bytemuck::{Pod, Zeroable};
use serde::Deserialize;

/// Strings longer than this are truncated to one byte less, matching the
/// upstream feed's corruption guard.
pub const STRING_CAP: usize = 48;

/// Top-level aircraft-list document.
#[derive(Debug, Clone, Deserialize)]
pub struct VrsDocument {
    /// Version token; some servers send it as a number, some as a string.
    #[serde(rename = "lastDv", default)]
    pub last_dv: Option<serde_json::Value>,
    #[serde(rename = "totalAc", default)]
    pub total_ac: Option<i64>,
    #[serde(rename = "acList", default)]
    pub ac_list: Vec<VrsAircraft>,
}

impl VrsDocument {
    /// Version token as text, for change detection across polls.
    pub fn version_token(&self) -> Option<String> {
        match &self.last_dv {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// One aircraft from `acList`. Numeric fields are accepted as any JSON
/// number; the feed reports some integer columns with fractional values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VrsAircraft {
    #[serde(rename = "Id")]
    pub id: Option<f64>,
    #[serde(rename = "TSecs")]
    pub tsecs: Option<f64>,
    #[serde(rename = "Rcvr")]
    pub rcvr: Option<f64>,
    #[serde(rename = "Icao")]
    pub icao: Option<String>,
    #[serde(rename = "Bad")]
    pub bad: Option<bool>,
    #[serde(rename = "Reg")]
    pub reg: Option<String>,
    #[serde(rename = "Alt")]
    pub alt: Option<f64>,
    #[serde(rename = "AltT")]
    pub alt_t: Option<f64>,
    #[serde(rename = "TAlt")]
    pub talt: Option<f64>,
    #[serde(rename = "Call")]
    pub call: Option<String>,
    #[serde(rename = "CallSus")]
    pub call_sus: Option<bool>,
    #[serde(rename = "Lat")]
    pub lat: Option<f64>,
    #[serde(rename = "Long")]
    pub long: Option<f64>,
    #[serde(rename = "PosTime")]
    pub pos_time: Option<f64>,
    #[serde(rename = "Spd")]
    pub spd: Option<f64>,
    #[serde(rename = "SpdTyp")]
    pub spd_typ: Option<f64>,
    #[serde(rename = "Vsi")]
    pub vsi: Option<f64>,
    #[serde(rename = "VsiT")]
    pub vsi_t: Option<f64>,
    #[serde(rename = "Trak")]
    pub trak: Option<f64>,
    #[serde(rename = "TrkH")]
    pub trk_h: Option<bool>,
    #[serde(rename = "TTrk")]
    pub ttrk: Option<f64>,
    #[serde(rename = "Mdl")]
    pub mdl: Option<String>,
    #[serde(rename = "Type")]
    pub aircraft_type: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "To")]
    pub to: Option<String>,
    #[serde(rename = "Op")]
    pub op: Option<String>,
    #[serde(rename = "OpCode")]
    pub op_code: Option<String>,
    #[serde(rename = "Sqk")]
    pub sqk: Option<f64>,
    #[serde(rename = "Help")]
    pub help: Option<bool>,
    #[serde(rename = "Dst")]
    pub dst: Option<f64>,
    #[serde(rename = "Brng")]
    pub brng: Option<f64>,
    #[serde(rename = "WTC")]
    pub wtc: Option<f64>,
    #[serde(rename = "Engines")]
    pub engines: Option<String>,
    #[serde(rename = "EngType")]
    pub eng_type: Option<f64>,
    #[serde(rename = "Species")]
    pub species: Option<f64>,
    #[serde(rename = "Mil")]
    pub mil: Option<bool>,
    #[serde(rename = "Cou")]
    pub cou: Option<String>,
    #[serde(rename = "HasPic")]
    pub has_pic: Option<bool>,
    #[serde(rename = "PicX")]
    pub pic_x: Option<f64>,
    #[serde(rename = "PicY")]
    pub pic_y: Option<f64>,
    #[serde(rename = "FlightsCount")]
    pub flights_count: Option<f64>,
    #[serde(rename = "CMsgs")]
    pub cmsgs: Option<f64>,
    #[serde(rename = "Gnd")]
    pub gnd: Option<bool>,
    #[serde(rename = "Tag")]
    pub tag: Option<String>,
    #[serde(rename = "Interested")]
    pub interested: Option<bool>,
    #[serde(rename = "TT")]
    pub tt: Option<String>,
    #[serde(rename = "Trt")]
    pub trt: Option<f64>,
    #[serde(rename = "ResetTrail")]
    pub reset_trail: Option<bool>,
    #[serde(rename = "HasSig")]
    pub has_sig: Option<bool>,
    #[serde(rename = "Sig")]
    pub sig: Option<f64>,
}

fn int_or(value: Option<f64>, default: i64) -> i64 {
    value.map(|v| v as i64).unwrap_or(default)
}

fn float_or(value: Option<f64>, default: f64) -> f64 {
    value.unwrap_or(default)
}

/// Apply the default and the length cap. Empty strings collapse to the
/// default, like missing fields.
fn text_or<'a>(value: &'a Option<String>) -> &'a str {
    match value.as_deref() {
        Some(s) if !s.is_empty() => s,
        _ => "",
    }
}

fn cap_text(s: &str) -> &str {
    if s.len() > STRING_CAP {
        let mut end = STRING_CAP - 1;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    } else {
        s
    }
}

/// Persisted aircraft-list row. Text column widths follow the declared
/// per-column minimum string sizes.
/// Total size: 608 bytes (216 numeric + 376 text + 10 flags + 6 pad).
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct VrsRow {
    // === 8-byte aligned section (offset 0) ===
    pub id: i64,
    pub tsecs: i64,
    pub rcvr: i64,
    pub alt: i64,
    pub alt_t: i64,
    pub talt: i64,
    pub pos_time: i64,
    pub spd: i64,
    pub spd_typ: i64,
    pub vsi: i64,
    pub vsi_t: i64,
    pub trak: i64,
    pub ttrk: i64,
    pub sqk: i64,
    pub dst: i64,
    pub brng: i64,
    pub wtc: i64,
    pub eng_type: i64,
    pub species: i64,
    pub pic_x: i64,
    pub pic_y: i64,
    pub flights_count: i64,
    pub cmsgs: i64,
    pub trt: i64,
    pub sig: i64,
    pub lat: f64,
    pub long: f64,

    // === Text columns (offset 216) ===
    pub icao: [u8; 32],
    pub reg: [u8; 32],
    pub call: [u8; 48],
    pub mdl: [u8; 32],
    pub aircraft_type: [u8; 32],
    pub from: [u8; 4],
    pub to: [u8; 4],
    pub op: [u8; 32],
    pub op_code: [u8; 32],
    pub engines: [u8; 32],
    pub cou: [u8; 32],
    pub tag: [u8; 32],
    pub tt: [u8; 32],

    // === Flags (offset 592) ===
    pub bad: u8,
    pub call_sus: u8,
    pub trk_h: u8,
    pub help: u8,
    pub mil: u8,
    pub has_pic: u8,
    pub gnd: u8,
    pub interested: u8,
    pub reset_trail: u8,
    pub has_sig: u8,
    pub _padding: [u8; 6],
}

impl VrsRow {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Normalize one aircraft to its persisted columnar form.
    pub fn from_aircraft(ac: &VrsAircraft) -> Self {
        let mut row = Self::zeroed();
        row.id = int_or(ac.id, -1);
        row.tsecs = int_or(ac.tsecs, -1);
        row.rcvr = int_or(ac.rcvr, -1);
        row.alt = int_or(ac.alt, -1);
        row.alt_t = int_or(ac.alt_t, -1);
        row.talt = int_or(ac.talt, -1);
        row.pos_time = int_or(ac.pos_time, -1);
        row.spd = int_or(ac.spd, -1);
        row.spd_typ = int_or(ac.spd_typ, -1);
        row.vsi = int_or(ac.vsi, -1);
        row.vsi_t = int_or(ac.vsi_t, -1);
        row.trak = int_or(ac.trak, -1);
        row.ttrk = int_or(ac.ttrk, -1);
        row.sqk = int_or(ac.sqk, -1);
        row.dst = int_or(ac.dst, -1);
        row.brng = int_or(ac.brng, -1);
        row.wtc = int_or(ac.wtc, -1);
        row.eng_type = int_or(ac.eng_type, -1);
        row.species = int_or(ac.species, -1);
        row.pic_x = int_or(ac.pic_x, -1);
        row.pic_y = int_or(ac.pic_y, -1);
        row.flights_count = int_or(ac.flights_count, -1);
        row.cmsgs = int_or(ac.cmsgs, -1);
        row.trt = int_or(ac.trt, -1);
        row.sig = int_or(ac.sig, -1);
        row.lat = float_or(ac.lat, -1.0);
        row.long = float_or(ac.long, -1.0);
        pack_str(&mut row.icao, cap_text(text_or(&ac.icao)));
        pack_str(&mut row.reg, cap_text(text_or(&ac.reg)));
        pack_str(&mut row.call, cap_text(text_or(&ac.call)));
        pack_str(&mut row.mdl, cap_text(text_or(&ac.mdl)));
        pack_str(&mut row.aircraft_type, cap_text(text_or(&ac.aircraft_type)));
        pack_str(&mut row.from, cap_text(text_or(&ac.from)));
        pack_str(&mut row.to, cap_text(text_or(&ac.to)));
        pack_str(&mut row.op, cap_text(text_or(&ac.op)));
        pack_str(&mut row.op_code, cap_text(text_or(&ac.op_code)));
        pack_str(&mut row.engines, cap_text(text_or(&ac.engines)));
        pack_str(&mut row.cou, cap_text(text_or(&ac.cou)));
        pack_str(&mut row.tag, cap_text(text_or(&ac.tag)));
        pack_str(&mut row.tt, cap_text(text_or(&ac.tt)));
        row.bad = ac.bad.unwrap_or(false) as u8;
        row.call_sus = ac.call_sus.unwrap_or(false) as u8;
        row.trk_h = ac.trk_h.unwrap_or(false) as u8;
        row.help = ac.help.unwrap_or(false) as u8;
        row.mil = ac.mil.unwrap_or(false) as u8;
        row.has_pic = ac.has_pic.unwrap_or(false) as u8;
        row.gnd = ac.gnd.unwrap_or(false) as u8;
        row.interested = ac.interested.unwrap_or(false) as u8;
        row.reset_trail = ac.reset_trail.unwrap_or(false) as u8;
        row.has_sig = ac.has_sig.unwrap_or(false) as u8;
        row
    }

    pub fn icao_str(&self) -> String {
        unpack_str(&self.icao)
    }

    pub fn call_str(&self) -> String {
        unpack_str(&self.call)
    }

    pub fn reg_str(&self) -> String {
        unpack_str(&self.reg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_size() {
        assert_eq!(VrsRow::SIZE, 608);
        assert_eq!(VrsRow::SIZE % 8, 0);
    }

    #[test]
    fn test_document_parse() {
        let doc: VrsDocument = serde_json::from_str(
            r#"{
                "lastDv": "636029531002346201",
                "totalAc": 2,
                "acList": [
                    {"Id": 10537559, "Icao": "A0F5D7", "Reg": "N7779",
                     "Alt": 37000, "Lat": 33.9425, "Long": -118.408,
                     "Spd": 460, "Trak": 271.1, "Call": "UAL123",
                     "Mil": false, "Gnd": false, "Sqk": 7232},
                    {"Id": 10537560, "Icao": "A0F5D8"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(doc.version_token().as_deref(), Some("636029531002346201"));
        assert_eq!(doc.total_ac, Some(2));
        assert_eq!(doc.ac_list.len(), 2);

        let row = VrsRow::from_aircraft(&doc.ac_list[0]);
        assert_eq!(row.icao_str(), "A0F5D7");
        assert_eq!(row.call_str(), "UAL123");
        assert_eq!(row.alt, 37000);
        assert_eq!(row.lat, 33.9425);
        // Fractional track truncates to the integer column type.
        assert_eq!(row.trak, 271);
        assert_eq!(row.sqk, 7232);
        assert_eq!(row.gnd, 0);
    }

    #[test]
    fn test_numeric_version_token() {
        let doc: VrsDocument =
            serde_json::from_str(r#"{"lastDv": 42, "acList": []}"#).unwrap();
        assert_eq!(doc.version_token().as_deref(), Some("42"));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let row = VrsRow::from_aircraft(&VrsAircraft::default());
        assert_eq!(row.id, -1);
        assert_eq!(row.alt, -1);
        assert_eq!(row.pos_time, -1);
        assert_eq!(row.lat, -1.0);
        assert_eq!(row.long, -1.0);
        assert_eq!(row.icao_str(), "");
        assert_eq!(row.bad, 0);
    }

    #[test]
    fn test_empty_string_collapses_to_default() {
        let ac = VrsAircraft {
            reg: Some(String::new()),
            ..VrsAircraft::default()
        };
        let row = VrsRow::from_aircraft(&ac);
        assert_eq!(row.reg_str(), "");
    }

    #[test]
    fn test_overlong_string_truncated() {
        let ac = VrsAircraft {
            call: Some("X".repeat(80)),
            ..VrsAircraft::default()
        };
        let row = VrsRow::from_aircraft(&ac);
        assert_eq!(row.call_str().len(), STRING_CAP - 1);
    }
}
