//! Update decision: should a photo be re-cropped and re-uploaded?

use tracing::warn;

use crate::record::TimestampField;

/// Pure decision over the record timestamps and configuration. Prevents
/// duplicate work: a photo whose update already tracks its biometric update
/// is left alone.
#[derive(Debug, Clone, Copy)]
pub struct UpdatePolicy {
    cropping_enabled: bool,
    /// Seconds below which the two timestamps count as already in sync;
    /// absorbs clock and write-latency skew between the two sources.
    tolerance_secs: i64,
}

impl UpdatePolicy {
    pub fn new(cropping_enabled: bool, tolerance_secs: i64) -> Self {
        Self {
            cropping_enabled,
            tolerance_secs,
        }
    }

    /// Total over all inputs: absent timestamps mean "needs initial
    /// processing", malformed ones decide `false` and log the anomaly.
    pub fn should_update_photo(
        &self,
        last_biometric_update: &TimestampField,
        last_photo_update: &TimestampField,
    ) -> bool {
        if !self.cropping_enabled {
            return false;
        }

        use TimestampField::{At, Invalid, Missing};
        match (last_biometric_update, last_photo_update) {
            (Missing, _) | (_, Missing) => true,
            (Invalid(raw), _) | (_, Invalid(raw)) => {
                warn!(%raw, "malformed record timestamp, skipping photo update");
                false
            }
            (At(biometric), At(photo)) => {
                (*biometric - *photo).num_seconds().abs() >= self.tolerance_secs
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn at(offset_secs: i64) -> TimestampField {
        let base = Utc.with_ymd_and_hms(2024, 5, 17, 12, 0, 0).unwrap();
        TimestampField::At(base + Duration::seconds(offset_secs))
    }

    fn policy(cropping_enabled: bool) -> UpdatePolicy {
        UpdatePolicy::new(cropping_enabled, 10)
    }

    #[test]
    fn missing_timestamps_need_initial_processing() {
        assert!(policy(true).should_update_photo(&TimestampField::Missing, &TimestampField::Missing));
        assert!(policy(true).should_update_photo(&at(0), &TimestampField::Missing));
        assert!(policy(true).should_update_photo(&TimestampField::Missing, &at(0)));
    }

    #[test]
    fn zero_diff_is_in_sync() {
        assert!(!policy(true).should_update_photo(&at(0), &at(0)));
    }

    #[test]
    fn diff_inside_tolerance_is_in_sync() {
        assert!(!policy(true).should_update_photo(&at(0), &at(9)));
        assert!(!policy(true).should_update_photo(&at(9), &at(0)));
    }

    #[test]
    fn diff_outside_tolerance_updates() {
        assert!(policy(true).should_update_photo(&at(0), &at(11)));
        assert!(policy(true).should_update_photo(&at(11), &at(0)));
    }

    #[test]
    fn cropping_disabled_never_updates() {
        assert!(!policy(false).should_update_photo(&at(0), &at(100)));
        assert!(!policy(false).should_update_photo(&TimestampField::Missing, &TimestampField::Missing));
    }

    #[test]
    fn malformed_timestamp_is_a_safe_no() {
        let invalid = TimestampField::Invalid("05/17/2024".to_string());
        assert!(!policy(true).should_update_photo(&invalid, &at(0)));
        assert!(!policy(true).should_update_photo(&at(0), &invalid));
    }
}
