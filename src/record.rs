//! Record types exchanged with the external cardholder system.

use chrono::{DateTime, NaiveDateTime, Utc};

/// One cardholder row from the record source, immutable during processing.
#[derive(Debug, Clone)]
pub struct PersonRecord {
    pub id: i64,
    /// Display only; never used for matching.
    pub first_name: String,
    pub last_biometric_update: TimestampField,
    pub last_photo_update: TimestampField,
}

/// A timestamp column as read from the record store. Malformed values are
/// carried as data so the update policy can fall back safely instead of
/// failing mid-batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampField {
    /// Never recorded (NULL or empty).
    Missing,
    /// Present but unparseable; carries the raw text for logging.
    Invalid(String),
    At(DateTime<Utc>),
}

impl TimestampField {
    /// Lenient parse of a raw column value. Accepts RFC 3339 and the
    /// `YYYY-MM-DD HH:MM:SS[.fff]` form the cardholder store writes.
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = match raw {
            Some(s) if !s.trim().is_empty() => s.trim(),
            _ => return TimestampField::Missing,
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return TimestampField::At(dt.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
                return TimestampField::At(dt.and_utc());
            }
        }

        TimestampField::Invalid(raw.to_string())
    }
}

/// The only artifact handed to the sync collaborator. `updated_at` is set
/// together with `photo_bytes`: a photo-update timestamp is never emitted
/// without a crop staged in the same run.
#[derive(Debug, Clone)]
pub struct UpdateCommand {
    pub id: i64,
    pub quality_score: i64,
    pub photo_bytes: Option<Vec<u8>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_null_and_empty_are_missing() {
        assert_eq!(TimestampField::parse(None), TimestampField::Missing);
        assert_eq!(TimestampField::parse(Some("")), TimestampField::Missing);
        assert_eq!(TimestampField::parse(Some("   ")), TimestampField::Missing);
    }

    #[test]
    fn parse_store_format() {
        let parsed = TimestampField::parse(Some("2024-05-17 09:30:00.250"));
        let expected = Utc
            .with_ymd_and_hms(2024, 5, 17, 9, 30, 0)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(250))
            .unwrap();
        assert_eq!(parsed, TimestampField::At(expected));
    }

    #[test]
    fn parse_rfc3339() {
        let parsed = TimestampField::parse(Some("2024-05-17T09:30:00Z"));
        let expected = Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap();
        assert_eq!(parsed, TimestampField::At(expected));
    }

    #[test]
    fn parse_garbage_is_invalid() {
        assert_eq!(
            TimestampField::parse(Some("not a date")),
            TimestampField::Invalid("not a date".to_string())
        );
    }
}
