//! Human-readable byte sizes for config files and fixtures.

use serde::de::{self, Deserializer, Visitor};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeError {
    #[error("empty size string")]
    Empty,
    #[error("size must start with a number: {0}")]
    NoNumber(String),
    #[error("invalid number: {0}")]
    BadNumber(String),
    #[error("unknown size unit '{0}' (use B, KB, MB, GB or TB)")]
    BadUnit(String),
}

/// Parse `"100MB"`, `"1.5 GB"` or a bare byte count. Units are binary
/// (1 KB = 1024 B) and case-insensitive.
pub fn parse_size(s: &str) -> Result<u64, SizeError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(SizeError::Empty);
    }

    let num_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    if num_end == 0 {
        return Err(SizeError::NoNumber(s.to_string()));
    }

    let (num_str, unit) = s.split_at(num_end);
    let unit = unit.trim().to_uppercase();
    if unit.is_empty() {
        return num_str
            .parse::<u64>()
            .map_err(|_| SizeError::BadNumber(num_str.to_string()));
    }

    let num: f64 = num_str
        .parse()
        .map_err(|_| SizeError::BadNumber(num_str.to_string()))?;
    let multiplier: u64 = match unit.as_str() {
        "B" => 1,
        "KB" | "K" => 1 << 10,
        "MB" | "M" => 1 << 20,
        "GB" | "G" => 1 << 30,
        "TB" | "T" => 1 << 40,
        _ => return Err(SizeError::BadUnit(unit)),
    };
    Ok((num * multiplier as f64) as u64)
}

/// Serde helper accepting either an integer byte count or a size string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct SizeVisitor;

    impl Visitor<'_> for SizeVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a byte count or a size such as \"10MB\"")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            u64::try_from(v).map_err(|_| E::custom("size cannot be negative"))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            parse_size(v).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(SizeVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("100MB").unwrap(), 104_857_600);
        assert_eq!(parse_size("1GB").unwrap(), 1_073_741_824);
        assert_eq!(parse_size("500KB").unwrap(), 512_000);
        assert_eq!(parse_size("2TB").unwrap(), 2_199_023_255_552);
        assert_eq!(parse_size("100").unwrap(), 100);
        assert_eq!(parse_size("1.5 gb").unwrap(), 1_610_612_736);
    }

    #[test]
    fn test_parse_size_errors() {
        assert_eq!(parse_size("  "), Err(SizeError::Empty));
        assert!(matches!(parse_size("MB"), Err(SizeError::NoNumber(_))));
        assert!(matches!(parse_size("10XB"), Err(SizeError::BadUnit(_))));
        assert!(matches!(parse_size("1.2.3MB"), Err(SizeError::BadNumber(_))));
    }

    #[test]
    fn test_deserialize_accepts_both_forms() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(deserialize_with = "super::deserialize")]
            a: u64,
            #[serde(deserialize_with = "super::deserialize")]
            b: u64,
        }
        let holder: Holder = toml::from_str("a = 2048\nb = \"2KB\"").unwrap();
        assert_eq!(holder.a, 2048);
        assert_eq!(holder.b, 2048);
    }
}
