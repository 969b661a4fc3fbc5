use std::time::Duration;
use std::str::FromStr;
use serde::{Deserialize, Deserializer};
use crate::error::{DdcswError, ValidationError};
use crate::Result;

/// Parses human-readable durations such as `30s`, `500ms` or `90days`.
pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    humantime::Duration::from_str(duration_str.trim())
        .map(|d| d.into())
        .map_err(|_| {
            DdcswError::Validation(ValidationError::InvalidDuration {
                duration: duration_str.to_string(),
            })
        })
}

/// serde helper for `deserialize_with`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let duration_str = String::deserialize(deserializer)?;
    parse_duration(&duration_str).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration(" 2m ").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("90days").unwrap(), Duration::from_secs(90 * 86400));
    }

    #[test]
    fn test_parse_duration_invalid() {
        match parse_duration("soon") {
            Err(DdcswError::Validation(ValidationError::InvalidDuration { duration })) => {
                assert_eq!(duration, "soon");
            }
            other => panic!("Expected InvalidDuration, got {:?}", other),
        }
    }
}
