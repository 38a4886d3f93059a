use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use utoipa::ToSchema;

/// Calendar years a supplied timestamp may fall in; the store's DATETIME column holds no more.
const SUPPORTED_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// Payload sent by the badge reader on clock-in and clock-out.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ClockEvent {
    #[schema(example = "DE284269")]
    pub card_uid: String,

    /// Unix timestamp recorded by the reader while offline
    #[schema(example = 1701234567, value_type = Option<i64>)]
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl ClockEvent {
    /// The instant the reader says the event happened, if it sent a usable one.
    ///
    /// Empty or zero-like values count as "not sent". Anything that cannot be read as epoch
    /// seconds, or lands outside years 1 to 9999 (epoch milliseconds, say), is dropped so the
    /// caller falls back to server time.
    pub fn supplied_instant(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_ref()?;

        let seconds = match raw {
            Value::Null | Value::Bool(false) => return None,
            Value::String(s) if s.is_empty() => return None,
            Value::Number(n) if n.as_f64() == Some(0.0) => return None,
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };

        let instant = seconds
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .filter(|at| SUPPORTED_YEARS.contains(&at.year()));
        if instant.is_none() {
            warn!(card_uid = %self.card_uid, timestamp = %raw, "Unreadable timestamp, using server time");
        }
        instant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn event(timestamp: Value) -> ClockEvent {
        serde_json::from_value(json!({ "card_uid": "DE284269", "timestamp": timestamp })).unwrap()
    }

    #[test]
    fn integer_timestamp_is_epoch_seconds() {
        let expected = Utc.with_ymd_and_hms(2023, 11, 29, 5, 9, 27).unwrap();
        assert_eq!(event(json!(1701234567)).supplied_instant(), Some(expected));
    }

    #[test]
    fn numeric_string_is_accepted() {
        let expected = Utc.with_ymd_and_hms(2023, 11, 29, 5, 9, 27).unwrap();
        assert_eq!(event(json!("1701234567")).supplied_instant(), Some(expected));
    }

    #[test]
    fn float_timestamp_is_truncated() {
        let expected = Utc.with_ymd_and_hms(2023, 11, 29, 5, 9, 27).unwrap();
        assert_eq!(event(json!(1701234567.9)).supplied_instant(), Some(expected));
    }

    #[test]
    fn missing_or_empty_values_mean_server_time() {
        let missing: ClockEvent = serde_json::from_value(json!({ "card_uid": "X" })).unwrap();
        assert_eq!(missing.supplied_instant(), None);
        assert_eq!(event(Value::Null).supplied_instant(), None);
        assert_eq!(event(json!(0)).supplied_instant(), None);
        assert_eq!(event(json!("")).supplied_instant(), None);
        assert_eq!(event(json!(false)).supplied_instant(), None);
    }

    #[test]
    fn malformed_values_fall_back() {
        assert_eq!(event(json!("yesterday")).supplied_instant(), None);
        assert_eq!(event(json!("12.5")).supplied_instant(), None);
        assert_eq!(event(json!([1, 2])).supplied_instant(), None);
        assert_eq!(event(json!(true)).supplied_instant(), None);
        assert_eq!(event(json!(i64::MAX)).supplied_instant(), None);
    }

    #[test]
    fn timestamps_outside_years_1_to_9999_fall_back() {
        // epoch milliseconds instead of seconds
        assert_eq!(event(json!(1701234567000_i64)).supplied_instant(), None);
        assert_eq!(event(json!("1701234567000")).supplied_instant(), None);
        // 0000-06-01, one year before the first supported one
        let year_zero = Utc.with_ymd_and_hms(0, 6, 1, 0, 0, 0).unwrap().timestamp();
        assert_eq!(event(json!(year_zero)).supplied_instant(), None);
        // 10000-01-01
        assert_eq!(event(json!(253402300800_i64)).supplied_instant(), None);

        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(event(json!(last.timestamp())).supplied_instant(), Some(last));
        let first = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(event(json!(first.timestamp())).supplied_instant(), Some(first));
    }
}
