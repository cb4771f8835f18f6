//! Conversions between Airtable wire strings and native values.
//!
//! All functions are pure. Formats:
//! - datetime: `YYYY-MM-DDTHH:MM:SS.mmmZ`
//! - date: `YYYY-MM-DD`
//! - phone: E.164 (`+<countrycode><digits>`)

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{AirtableError, Result};

/// Country code assumed when a phone number has none.
pub const DEFAULT_COUNTRY_CODE: u16 = 1;

// `%3f` reads and writes exactly three fraction digits.
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%3fZ";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Formats a datetime as an Airtable ISO 8601 string, e.g.
/// `"2014-09-05T12:34:56.000Z"`.
///
/// Sub-millisecond precision is truncated.
pub fn datetime_to_iso_str(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// Parses an Airtable ISO 8601 datetime string such as
/// `"2014-09-05T07:00:00.000Z"`.
///
/// The fraction must have exactly three digits and the `Z` suffix is
/// required.
pub fn datetime_from_iso_str(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT).map_err(|source| {
        AirtableError::Parse {
            value: value.to_owned(),
            expected: "ISO 8601 datetime (YYYY-MM-DDTHH:MM:SS.mmmZ)",
            source,
        }
    })
}

/// Formats a date, or the date part of a datetime, as `"YYYY-MM-DD"`.
pub fn date_to_iso_str<D: Datelike>(value: &D) -> String {
    format!("{:04}-{:02}-{:02}", value.year(), value.month(), value.day())
}

/// Parses an Airtable ISO 8601 date string such as `"2014-09-05"`.
pub fn date_from_iso_str(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|source| AirtableError::Parse {
        value: value.to_owned(),
        expected: "ISO 8601 date (YYYY-MM-DD)",
        source,
    })
}

/// Attachment object as accepted by Airtable when creating records.
///
/// Airtable downloads the file at `url` and keeps its own copy; the other
/// attachment properties (`id`, `size`, `type`, ...) are filled in server
/// side and ignored here. Attachment field values must be an array of these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Builds an attachment object. An empty `filename` is omitted.
///
/// ```
/// let value = serde_json::to_value(airtable_orm::attachment("https://x/a.png", "")).unwrap();
/// assert_eq!(value, serde_json::json!({ "url": "https://x/a.png" }));
/// ```
pub fn attachment(url: impl Into<String>, filename: impl Into<String>) -> Attachment {
    let filename = filename.into();
    Attachment {
        url: url.into(),
        filename: (!filename.is_empty()).then_some(filename),
    }
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<country_code>\+\d{1,3})?(?:\s+)?\(?(\d+)\)?(?:[\s.-]+)?(\d+)(?:[\s.-])?(\d+)(?:[\s.-])?(\d+)$",
        )
        .expect("phone pattern must compile")
    })
}

/// Normalises a free-form phone number to E.164.
///
/// Accepts spaces, dots, hyphens and parentheses between digit groups. When
/// the input carries no `+<countrycode>` prefix, `country_code` is prepended.
/// Returns `None` when the input is not a recognisable phone number.
pub fn phone_to_e164(value: &str, country_code: u16) -> Option<String> {
    let captures = phone_pattern().captures(value)?;
    let mut e164 = match captures.name("country_code") {
        Some(code) => code.as_str().to_owned(),
        None => format!("+{country_code}"),
    };
    for group in captures.iter().skip(2).flatten() {
        e164.push_str(group.as_str());
    }
    Some(e164)
}

/// Formats an E.164 number as `+<cc> ddd-ddd-dddd`.
///
/// Only `+<country_code>` followed by exactly ten digits is recognised; any
/// other input is returned unchanged.
pub fn phone_from_e164(value: &str, country_code: u16) -> String {
    let prefix = format!("+{country_code}");
    let Some(digits) = value.strip_prefix(&prefix) else {
        return value.to_owned();
    };
    if digits.len() != 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return value.to_owned();
    }
    format!(
        "{prefix} {}-{}-{}",
        &digits[..3],
        &digits[3..6],
        &digits[6..]
    )
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, Timelike};
    use serde_json::json;

    use super::*;

    const PHONE_SPELLINGS: [&str; 8] = [
        "9876543210",
        "987-654-3210",
        "(987) 654-3210",
        "987 654 3210",
        "987.654.3210",
        "+1 987.654.3210",
        "+1 (987) 654.3210",
        "+19876543210",
    ];

    fn datetime(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_milli_opt(h, mi, s, ms)
            .unwrap()
    }

    #[test]
    fn datetime_formats_with_three_fraction_digits_and_z() {
        assert_eq!(
            datetime_to_iso_str(&datetime(2014, 9, 5, 12, 34, 56, 0)),
            "2014-09-05T12:34:56.000Z"
        );
        assert_eq!(
            datetime_to_iso_str(&datetime(2014, 9, 5, 12, 34, 56, 7)),
            "2014-09-05T12:34:56.007Z"
        );
    }

    #[test]
    fn datetime_truncates_sub_millisecond_precision() {
        let value = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_micro_opt(0, 0, 0, 123_999)
            .unwrap();
        assert_eq!(datetime_to_iso_str(&value), "2020-01-01T00:00:00.123Z");
    }

    #[test]
    fn datetime_round_trips() {
        for value in [
            datetime(2000, 1, 2, 3, 4, 5, 0),
            datetime(1999, 12, 31, 23, 59, 59, 999),
            datetime(2024, 2, 29, 0, 0, 0, 1),
        ] {
            let wire = datetime_to_iso_str(&value);
            assert_eq!(datetime_from_iso_str(&wire).unwrap(), value);
        }
    }

    #[test]
    fn datetime_parses_components() {
        let parsed = datetime_from_iso_str("2014-09-05T07:00:00.000Z").unwrap();
        assert_eq!(parsed.date(), NaiveDate::from_ymd_opt(2014, 9, 5).unwrap());
        assert_eq!(parsed.hour(), 7);
    }

    #[test]
    fn malformed_datetime_is_parse_error() {
        for value in [
            "",
            "2014-09-05",
            "2014-09-05T07:00:00.000",
            "2014-09-05T07:00:00Z",
            "2014-09-05T07:00:00.1Z",
            "2014-09-05T07:00:00.1234567Z",
            "yesterday",
        ] {
            let err = datetime_from_iso_str(value).expect_err("must fail");
            assert!(matches!(err, AirtableError::Parse { .. }), "{value}");
        }
    }

    #[test]
    fn date_round_trips() {
        for value in [
            NaiveDate::from_ymd_opt(2000, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        ] {
            let wire = date_to_iso_str(&value);
            assert_eq!(date_from_iso_str(&wire).unwrap(), value);
        }
    }

    #[test]
    fn date_from_datetime_drops_time() {
        let value = datetime(2014, 9, 5, 23, 59, 59, 999);
        assert_eq!(date_to_iso_str(&value), "2014-09-05");
    }

    #[test]
    fn malformed_date_is_parse_error() {
        let err = date_from_iso_str("05/09/2014").expect_err("must fail");
        assert!(matches!(err, AirtableError::Parse { .. }));
    }

    #[test]
    fn attachment_without_filename() {
        let value = serde_json::to_value(attachment("https://example.com/a.png", "")).unwrap();
        assert_eq!(value, json!({ "url": "https://example.com/a.png" }));
    }

    #[test]
    fn attachment_with_filename() {
        let value =
            serde_json::to_value(attachment("https://example.com/a.png", "a.png")).unwrap();
        assert_eq!(
            value,
            json!({ "url": "https://example.com/a.png", "filename": "a.png" })
        );
    }

    #[test]
    fn phone_spellings_normalise_to_e164() {
        for value in PHONE_SPELLINGS {
            assert_eq!(
                phone_to_e164(value, DEFAULT_COUNTRY_CODE).as_deref(),
                Some("+19876543210"),
                "{value}"
            );
        }
    }

    #[test]
    fn phone_uses_given_default_country_code() {
        assert_eq!(
            phone_to_e164("20 7946 0958", 44).as_deref(),
            Some("+442079460958")
        );
    }

    #[test]
    fn unparseable_phone_is_none() {
        for value in ["", "abc", "987-abc-3210", "+"] {
            assert_eq!(phone_to_e164(value, DEFAULT_COUNTRY_CODE), None, "{value}");
        }
    }

    #[test]
    fn e164_formats_for_display() {
        assert_eq!(
            phone_from_e164("+19876543210", DEFAULT_COUNTRY_CODE),
            "+1 987-654-3210"
        );
    }

    #[test]
    fn unrecognised_e164_is_returned_unchanged() {
        for value in ["987-654-3210", "+1987654321", "+198765432100", "+449876543210", ""] {
            assert_eq!(phone_from_e164(value, DEFAULT_COUNTRY_CODE), value);
        }
    }
}
