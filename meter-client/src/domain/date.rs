use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{macros::format_description, Date};

use super::DomainError;

/// Calendar day a reading was taken on.
///
/// Only the zero-padded `YYYY-MM-DD` form parses, so ordering the rendered
/// strings and ordering the dates always agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReadingDate(Date);

impl ReadingDate {
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    pub fn date(&self) -> Date {
        self.0
    }
}

impl From<Date> for ReadingDate {
    fn from(date: Date) -> Self {
        Self(date)
    }
}

impl FromStr for ReadingDate {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let shape_ok = bytes.len() == 10
            && bytes.iter().enumerate().all(|(i, b)| match i {
                4 | 7 => *b == b'-',
                _ => b.is_ascii_digit(),
            });
        if !shape_ok {
            return Err(DomainError::InvalidDate(s.to_string()));
        }

        Date::parse(s, format_description!("[year]-[month]-[day]"))
            .map(Self)
            .map_err(|_| DomainError::InvalidDate(s.to_string()))
    }
}

impl fmt::Display for ReadingDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.0;
        write!(f, "{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
    }
}

impl Serialize for ReadingDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReadingDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_zero_padded_iso_dates() {
        let d: ReadingDate = "2026-02-01".parse().unwrap();
        assert_eq!(d.date(), date!(2026 - 02 - 01));
        assert_eq!(d.to_string(), "2026-02-01");
    }

    #[test]
    fn rejects_unpadded_and_impossible_dates() {
        for raw in ["2026-2-1", "2026-02-1", "26-02-01", "2026/02/01", "2026-02-30", ""] {
            assert!(raw.parse::<ReadingDate>().is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn ordering_is_chronological() {
        let jan: ReadingDate = "2026-01-31".parse().unwrap();
        let feb: ReadingDate = "2026-02-01".parse().unwrap();
        assert!(jan < feb);
    }

    #[test]
    fn serde_uses_the_string_form() {
        let d: ReadingDate = serde_json::from_str("\"2025-12-05\"").unwrap();
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"2025-12-05\"");
        assert!(serde_json::from_str::<ReadingDate>("\"05.12.2025\"").is_err());
    }
}
