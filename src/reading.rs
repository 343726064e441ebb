// 📟 Meter readings - raw rows and their normalized, storable form
//
// RawReading is what the CSV decoder hands out: unvalidated text.
// NormalizedReading is what the store keeps: one per account, value padded
// to five digits. `RawReading::normalize` is the only way between the two.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Fixed reading timestamp format (`dd/MM/yyyy HH:mm`).
pub const READING_TIME_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Minimum width of a stored meter value.
pub const READ_VALUE_WIDTH: usize = 5;

/// Parse a reading timestamp in the fixed format.
///
/// Returns `None` for anything that is not exactly `dd/MM/yyyy HH:mm`:
/// chrono accepts single-digit day, month and hour, so the parsed value must
/// format back to the same text.
pub fn parse_reading_time(text: &str) -> Option<NaiveDateTime> {
    let ts = NaiveDateTime::parse_from_str(text, READING_TIME_FORMAT).ok()?;
    (ts.format(READING_TIME_FORMAT).to_string() == text).then_some(ts)
}

/// Normalize a meter value: non-negative integer, zero-padded to five digits.
///
/// "7" → "00007", "12345" → "12345", "123456" → "123456".
/// Returns `None` if the text is not a non-negative integer.
pub fn normalize_read_value(text: &str) -> Option<String> {
    let value: u32 = text.trim().parse().ok()?;
    if value > i32::MAX as u32 {
        return None;
    }
    Some(format!("{:0width$}", value, width = READ_VALUE_WIDTH))
}

// ============================================================================
// RAW READING
// ============================================================================

/// One decoded CSV row, before any validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub account_id: i64,
    pub meter_reading_date_time: String,
    pub meter_read_value: String,

    /// Source line in the uploaded file (1-based, header is line 1)
    pub line: u64,
}

impl RawReading {
    pub fn new(account_id: i64, date_time: &str, value: &str) -> Self {
        RawReading {
            account_id,
            meter_reading_date_time: date_time.to_string(),
            meter_read_value: value.to_string(),
            line: 0,
        }
    }

    /// Builder pattern: attach the source line
    pub fn at_line(mut self, line: u64) -> Self {
        self.line = line;
        self
    }

    /// Map this row to its storable form.
    ///
    /// Only the meter value is validated here. The timestamp text is kept
    /// verbatim; whether it parses matters only when it is compared against
    /// an existing reading.
    pub fn normalize(&self) -> Option<NormalizedReading> {
        let meter_read_value = normalize_read_value(&self.meter_read_value)?;
        Some(NormalizedReading {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: self.account_id,
            meter_reading_date_time: self.meter_reading_date_time.clone(),
            meter_read_value,
        })
    }
}

// ============================================================================
// NORMALIZED READING
// ============================================================================

/// The current reading for an account, as kept by a `ReadingStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReading {
    /// Stable identity, assigned on first insert and kept across replacements
    pub id: String,
    pub account_id: i64,
    pub meter_reading_date_time: String,
    pub meter_read_value: String,
}

impl NormalizedReading {
    /// Parsed timestamp, if the stored text is in the fixed format
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        parse_reading_time(&self.meter_reading_date_time)
    }

    /// True if `self` is strictly later than `current`.
    ///
    /// Either timestamp failing to parse means "not later".
    pub fn supersedes(&self, current: &NormalizedReading) -> bool {
        match (current.timestamp(), self.timestamp()) {
            (Some(existing), Some(incoming)) => incoming > existing,
            _ => false,
        }
    }

    /// Take over the identity of the reading being replaced.
    pub fn replacing(mut self, current: &NormalizedReading) -> Self {
        self.id = current.id.clone();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_read_value_pads_to_five_digits() {
        assert_eq!(normalize_read_value("7").as_deref(), Some("00007"));
        assert_eq!(normalize_read_value("12345").as_deref(), Some("12345"));
        assert_eq!(normalize_read_value("00042").as_deref(), Some("00042"));
        assert_eq!(normalize_read_value("123456").as_deref(), Some("123456"));
        assert_eq!(normalize_read_value(" 99 ").as_deref(), Some("00099"));
    }

    #[test]
    fn test_normalize_read_value_rejects_non_integers() {
        assert_eq!(normalize_read_value("VOID"), None);
        assert_eq!(normalize_read_value(""), None);
        assert_eq!(normalize_read_value("-5"), None);
        assert_eq!(normalize_read_value("1.5"), None);
        assert_eq!(normalize_read_value("99999999999"), None);
    }

    #[test]
    fn test_parse_reading_time() {
        let ts = parse_reading_time("22/04/2019 09:24").unwrap();
        assert_eq!(ts.format("%Y-%m-%d %H:%M").to_string(), "2019-04-22 09:24");

        assert!(parse_reading_time("2019-04-22 09:24").is_none());
        assert!(parse_reading_time("31/02/2019 09:24").is_none());
        assert!(parse_reading_time("").is_none());
    }

    #[test]
    fn test_parse_reading_time_requires_two_digit_fields() {
        assert!(parse_reading_time("2/1/2024 8:00").is_none());
        assert!(parse_reading_time("02/1/2024 08:00").is_none());
        assert!(parse_reading_time("02/01/2024 8:00").is_none());
        assert!(parse_reading_time("02/01/2024 08:00").is_some());
    }

    #[test]
    fn test_normalize_keeps_timestamp_text() {
        let raw = RawReading::new(2344, "22/04/2019 09:24", "1002");
        let reading = raw.normalize().unwrap();

        assert_eq!(reading.account_id, 2344);
        assert_eq!(reading.meter_reading_date_time, "22/04/2019 09:24");
        assert_eq!(reading.meter_read_value, "01002");
        assert!(!reading.id.is_empty());

        let unparsable = RawReading::new(2344, "not a date", "1").normalize().unwrap();
        assert_eq!(unparsable.meter_reading_date_time, "not a date");
        assert!(unparsable.timestamp().is_none());
    }

    #[test]
    fn test_supersedes_is_strict() {
        let earlier = RawReading::new(1, "01/01/2024 08:00", "10").normalize().unwrap();
        let later = RawReading::new(1, "02/01/2024 08:00", "12").normalize().unwrap();
        let same = RawReading::new(1, "01/01/2024 08:00", "11").normalize().unwrap();
        let broken = RawReading::new(1, "garbage", "11").normalize().unwrap();

        assert!(later.supersedes(&earlier));
        assert!(!earlier.supersedes(&later));
        assert!(!same.supersedes(&earlier));
        assert!(!broken.supersedes(&earlier));
        assert!(!later.supersedes(&broken));
    }

    #[test]
    fn test_replacing_keeps_identity() {
        let current = RawReading::new(1, "01/01/2024 08:00", "10").normalize().unwrap();
        let next = RawReading::new(1, "02/01/2024 08:00", "12")
            .normalize()
            .unwrap()
            .replacing(&current);

        assert_eq!(next.id, current.id);
        assert_eq!(next.meter_read_value, "00012");
    }

    #[test]
    fn test_serializes_camel_case() {
        let reading = NormalizedReading {
            id: "abc".to_string(),
            account_id: 1,
            meter_reading_date_time: "01/01/2024 08:00".to_string(),
            meter_read_value: "00010".to_string(),
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["accountId"], 1);
        assert_eq!(json["meterReadingDateTime"], "01/01/2024 08:00");
        assert_eq!(json["meterReadValue"], "00010");
    }
}
