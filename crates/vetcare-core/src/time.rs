use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

/// Point in time stored on clinical documents.
///
/// Serialized as RFC 3339. Parsing also accepts a bare calendar date
/// (`2024-03-01`), which is interpreted as midnight UTC since visit forms
/// usually submit dates without a time component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub OffsetDateTime);

impl Timestamp {
    pub fn new(datetime: OffsetDateTime) -> Self {
        Self(datetime)
    }

    pub fn inner(&self) -> &OffsetDateTime {
        &self.0
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// Calendar date portion, `YYYY-MM-DD`.
    pub fn date_string(&self) -> String {
        self.0
            .format(format_description!("[year]-[month]-[day]"))
            .unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.0.format(&Rfc3339).map_err(|_| fmt::Error)?;
        write!(f, "{formatted}")
    }
}

impl FromStr for Timestamp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(datetime) = OffsetDateTime::parse(s, &Rfc3339) {
            return Ok(Timestamp(datetime));
        }
        Date::parse(s, format_description!("[year]-[month]-[day]"))
            .map(|date| Timestamp(date.midnight().assume_utc()))
            .map_err(|e| CoreError::invalid_timestamp(format!("'{s}': {e}")))
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = self.0.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Timestamp::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(datetime: OffsetDateTime) -> Self {
        Self(datetime)
    }
}

pub fn now_utc() -> Timestamp {
    Timestamp(OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_timestamp_display() {
        let ts = Timestamp::new(datetime!(2024-05-15 14:30:00 UTC));
        assert_eq!(ts.to_string(), "2024-05-15T14:30:00Z");
    }

    #[test]
    fn test_timestamp_from_rfc3339_with_offset() {
        let ts = Timestamp::from_str("2024-05-15T14:30:00+02:00").unwrap();
        assert_eq!(
            ts.0.to_offset(time::UtcOffset::UTC),
            datetime!(2024-05-15 12:30:00 UTC)
        );
    }

    #[test]
    fn test_timestamp_from_bare_date() {
        let ts = Timestamp::from_str("2024-03-01").unwrap();
        assert_eq!(ts.0, datetime!(2024-03-01 00:00:00 UTC));
        assert_eq!(ts.date_string(), "2024-03-01");
    }

    #[test]
    fn test_timestamp_rejects_garbage() {
        let err = Timestamp::from_str("yesterday").unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_timestamp_serde_roundtrip_shape() {
        let ts = Timestamp::new(datetime!(2024-01-02 03:04:05 UTC));
        let json = serde_json::to_value(ts).unwrap();
        assert_eq!(json, serde_json::json!("2024-01-02T03:04:05Z"));
        let back: Timestamp = serde_json::from_value(json).unwrap();
        assert_eq!(back, ts);
    }
}
