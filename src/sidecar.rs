//! Sidecar JSON parsing.
//!
//! Photo-backup exports describe each media item in a detached JSON file:
//!
//! ```json
//! {
//!   "title": "IMG_0001.jpg",
//!   "description": "Beach day",
//!   "photoTakenTime": { "timestamp": "1609459200" },
//!   "geoData": { "latitude": 40.0, "longitude": -74.0 }
//! }
//! ```
//!
//! Parsing is lenient: unknown fields are ignored and a malformed timestamp or
//! location simply leaves that field empty. Only unparsable JSON is an error.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// EXIF `DateTimeOriginal` layout.
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
/// ISO-8601 UTC layout accepted for capture times given as strings.
const ISO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A decimal-degree location taken from the sidecar's `geoData`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Metadata parsed from one sidecar file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataRecord {
    /// Declared filename of the media, extension included.
    pub title: Option<String>,
    /// Original capture time, in UTC.
    pub captured_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub location: Option<Location>,
}

/// Wire shape of a sidecar. Every field is kept as a raw value so that one
/// badly typed field cannot fail the whole record.
#[derive(Debug, Deserialize)]
struct RawSidecar {
    title: Option<Value>,
    description: Option<Value>,
    #[serde(rename = "photoTakenTime")]
    photo_taken_time: Option<Value>,
    #[serde(rename = "creationTime")]
    creation_time: Option<Value>,
    #[serde(rename = "geoData")]
    geo_data: Option<Value>,
}

impl MetadataRecord {
    /// Parse a record from the raw bytes of a sidecar.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        let raw: RawSidecar = serde_json::from_slice(bytes)?;
        Ok(Self::from_raw(raw))
    }

    /// Parse a record from a JSON string.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        Self::from_slice(text.as_bytes())
    }

    fn from_raw(raw: RawSidecar) -> Self {
        let captured_at = raw
            .photo_taken_time
            .as_ref()
            .and_then(parse_taken_time)
            .or_else(|| raw.creation_time.as_ref().and_then(parse_taken_time));

        Self {
            title: raw.title.as_ref().and_then(non_empty_string),
            captured_at,
            description: raw.description.as_ref().and_then(non_empty_string),
            location: raw.geo_data.as_ref().and_then(parse_location),
        }
    }

    /// Capture year, used to pick the output bucket.
    pub fn year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.captured_at.map(|dt| dt.year())
    }

    /// Capture time formatted for the EXIF `DateTimeOriginal` tag.
    pub fn exif_datetime(&self) -> Option<String> {
        self.captured_at.as_ref().map(format_exif_datetime)
    }
}

/// Read and parse a sidecar file.
pub fn read_sidecar(path: &Path) -> Result<MetadataRecord> {
    let bytes = std::fs::read(path).context("Failed to read sidecar")?;
    MetadataRecord::from_slice(&bytes).context("Failed to parse sidecar JSON")
}

/// Format a timestamp as `YYYY:MM:DD HH:MM:SS`.
pub fn format_exif_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(EXIF_DATETIME_FORMAT).to_string()
}

fn non_empty_string(val: &Value) -> Option<String> {
    match val {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Accepts `{"timestamp": "1609459200"}` (string or integer seconds) or a bare
/// `"2021-01-01T00:00:00Z"` string.
fn parse_taken_time(val: &Value) -> Option<DateTime<Utc>> {
    match val {
        Value::Object(map) => map.get("timestamp").and_then(parse_epoch_seconds),
        Value::String(s) => parse_iso_utc(s),
        _ => None,
    }
}

fn parse_epoch_seconds(val: &Value) -> Option<DateTime<Utc>> {
    let secs = match val {
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0)
}

fn parse_iso_utc(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s.trim(), ISO_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_location(val: &Value) -> Option<Location> {
    let latitude = coordinate(val.get("latitude")?)?;
    let longitude = coordinate(val.get("longitude")?)?;

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        log::debug!("Ignoring out-of-range location {latitude}, {longitude}");
        return None;
    }

    Some(Location { latitude, longitude })
}

fn coordinate(val: &Value) -> Option<f64> {
    let v = match val {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}
