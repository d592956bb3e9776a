//! Timestamp format used in forms and the JSON interface, e.g. `2020-05-01T12:30:00`.
//!
//! Seconds are kept so that editing a post does not move its publication time.
use chrono::{NaiveDate, NaiveDateTime};
use serde::{self, Deserialize, Deserializer, Serializer};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Formats accepted on input, tried in order.
const INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

pub fn format(date: &NaiveDateTime) -> String {
    date.format(FORMAT).to_string()
}

/// Parses a timestamp from a form field. A bare date means midnight.
pub fn parse(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_hms(0, 0, 0))
        })
}

pub fn serialize<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(date))
}

pub fn deserialize<'d, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'d>,
{
    let s = String::deserialize(deserializer)?;
    parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid date '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_inputs() {
        let expected = NaiveDate::from_ymd(2020, 5, 1).and_hms(12, 30, 0);
        assert_eq!(parse("2020-05-01T12:30"), Some(expected));
        assert_eq!(parse("2020-05-01T12:30:00"), Some(expected));
        assert_eq!(parse("2020-05-01 12:30"), Some(expected));
        assert_eq!(parse(" 2020-05-01 12:30:00 "), Some(expected));
        assert_eq!(
            parse("2020-05-01"),
            Some(NaiveDate::from_ymd(2020, 5, 1).and_hms(0, 0, 0))
        );
    }

    #[test]
    fn rejected_inputs() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("yesterday"), None);
        assert_eq!(parse("2020-13-01"), None);
    }

    #[test]
    fn formats_for_datetime_input() {
        let date = NaiveDate::from_ymd(2021, 12, 31).and_hms(23, 59, 10);
        assert_eq!(format(&date), "2021-12-31T23:59:10");
    }

    #[test]
    fn format_parses_back_to_the_same_second() {
        let date = NaiveDateTime::from_timestamp(1_600_000_000, 0);
        assert_eq!(date.format("%S").to_string(), "40");
        assert_eq!(parse(&format(&date)), Some(date));
    }
}
