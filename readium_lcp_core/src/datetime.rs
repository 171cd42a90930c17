//! 日期时间的序列化格式
//!
//! - `w3c`: 许可证 `issued` 与权限 `start`/`end` 使用的严格格式
//!   `2024-05-01T10:00:00+02:00`
//! - `iso8601`: 设备、时间戳、事件使用的宽松格式，接受 RFC 3339
//!   以及 `+0200` 形式的时区偏移

use chrono::{DateTime, FixedOffset, ParseError};
use serde::{Deserialize, Deserializer, Serializer};

/// 严格 W3C 格式（`Y-m-d'T'H:i:sP`）
pub mod w3c {
    use super::*;

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

    pub fn format(value: &DateTime<FixedOffset>) -> String {
        value.format(FORMAT).to_string()
    }

    pub fn parse(value: &str) -> Result<DateTime<FixedOffset>, ParseError> {
        DateTime::parse_from_str(value, FORMAT).or_else(|_| DateTime::parse_from_rfc3339(value))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<FixedOffset>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&format(value)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<FixedOffset>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) if !raw.is_empty() => parse(&raw).map(Some).map_err(serde::de::Error::custom),
                _ => Ok(None),
            }
        }
    }
}

/// 宽松 ISO 8601 格式
pub mod iso8601 {
    use super::*;

    const COMPACT_OFFSET: &str = "%Y-%m-%dT%H:%M:%S%z";

    pub fn format(value: &DateTime<FixedOffset>) -> String {
        value.to_rfc3339()
    }

    pub fn parse(value: &str) -> Result<DateTime<FixedOffset>, ParseError> {
        DateTime::parse_from_rfc3339(value).or_else(|_| DateTime::parse_from_str(value, COMPACT_OFFSET))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<FixedOffset>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&format(value)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<FixedOffset>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) if !raw.is_empty() => parse(&raw).map(Some).map_err(serde::de::Error::custom),
                _ => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_w3c_format_has_colon_offset_and_no_fraction() {
        let value = DateTime::parse_from_rfc3339("2024-05-01T10:00:00.750+02:00").unwrap();
        assert_eq!(w3c::format(&value), "2024-05-01T10:00:00+02:00");
    }

    #[test]
    fn test_w3c_parse_accepts_utc_designator() {
        let value = w3c::parse("2024-05-01T08:00:00Z").unwrap();
        assert_eq!(w3c::format(&value), "2024-05-01T08:00:00+00:00");
    }

    #[test]
    fn test_iso8601_parse_compact_offset() {
        let compact = iso8601::parse("2024-05-01T10:00:00+0200").unwrap();
        let rfc = iso8601::parse("2024-05-01T10:00:00+02:00").unwrap();
        assert_eq!(compact, rfc);
    }

    #[test]
    fn test_iso8601_rejects_garbage() {
        assert!(iso8601::parse("yesterday").is_err());
        assert!(w3c::parse("2024-13-01T00:00:00+00:00").is_err());
    }
}
