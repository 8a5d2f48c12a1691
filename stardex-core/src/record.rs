//! Flat catalogue records and coordinate scaling.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Scale factor between catalogue light-year units and stored integers.
pub const COORD_SCALE: f64 = 128.0;

/// Sentinel marking a coordinate that was absent from the source record.
pub const COORD_UNSET: i32 = i32::MIN;

/// Convert a catalogue coordinate to its stored integer form.
///
/// The value is multiplied by [`COORD_SCALE`] and truncated toward zero.
/// Non-finite input maps to [`COORD_UNSET`].
///
/// # Examples
/// ```
/// use stardex_core::{COORD_UNSET, scale_coord};
///
/// assert_eq!(scale_coord(1.0), 128);
/// assert_eq!(scale_coord(-0.5), -64);
/// assert_eq!(scale_coord(f64::NAN), COORD_UNSET);
/// ```
#[must_use]
pub fn scale_coord(value: f64) -> i32 {
    if value.is_finite() {
        (value * COORD_SCALE) as i32
    } else {
        COORD_UNSET
    }
}

/// Parse a catalogue timestamp.
///
/// Accepts RFC 3339 (`2015-01-01T00:00:00Z`) and the catalogue's older
/// space-separated form (`2015-01-01 00:00:00`), both interpreted as UTC.
///
/// # Errors
/// Returns the underlying parse error when neither form matches.
pub fn parse_catalogue_date(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|naive| naive.and_utc())
        })
}

/// One decoded catalogue entry: external identifier, display name, scaled
/// integer coordinates and an optional last-modified timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemRecord {
    /// Identifier assigned by the external catalogue.
    pub external_id: i64,
    /// Display name of the system.
    pub name: String,
    /// Last-modified timestamp, when the record carried one.
    pub date: Option<DateTime<Utc>>,
    /// Scaled X coordinate.
    pub x: i32,
    /// Scaled Y coordinate.
    pub y: i32,
    /// Scaled Z coordinate.
    pub z: i32,
}

impl SystemRecord {
    /// Whether the record carries enough data to import.
    ///
    /// A record needs a non-empty name, a non-negative external id and a
    /// resolved Z coordinate. X and Y are deliberately not checked.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.external_id >= 0 && !self.name.is_empty() && self.z != COORD_UNSET
    }
}
