//! Lenient timestamp decoding for CLI output.
//!
//! The CLI reports attribute dates either as RFC 3339 strings or as Unix
//! epoch seconds depending on command and version.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_epoch)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid epoch timestamp: {n}"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => parse(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}"))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected timestamp, got {other}"
        ))),
    }
}

/// RFC 3339, naive ISO 8601 (assumed UTC) or epoch seconds as text.
pub fn parse(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    text.parse::<i64>().ok().and_then(from_epoch)
}

fn from_epoch(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize_opt")]
        at: Option<DateTime<Utc>>,
    }

    fn decode(json: &str) -> Option<DateTime<Utc>> {
        serde_json::from_str::<Holder>(json).unwrap().at
    }

    #[test]
    fn accepts_epoch_rfc3339_and_absent() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(decode(r#"{"at": 1705314600}"#), Some(expected));
        assert_eq!(decode(r#"{"at": "2024-01-15T10:30:00+00:00"}"#), Some(expected));
        assert_eq!(decode(r#"{"at": "2024-01-15T10:30:00"}"#), Some(expected));
        assert_eq!(decode(r#"{"at": "1705314600"}"#), Some(expected));
        assert_eq!(decode(r#"{"at": null}"#), None);
        assert_eq!(decode(r#"{}"#), None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Holder>(r#"{"at": "yesterday"}"#).is_err());
        assert!(serde_json::from_str::<Holder>(r#"{"at": true}"#).is_err());
    }
}
