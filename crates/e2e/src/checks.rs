//! Assertions over observed UI state
//!
//! Each check returns [`E2eError::Assertion`] carrying what was checked, the
//! expectation and the observed value, so a failed scenario reads without a
//! debugger.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use studygroup_pages::SortOrder;

use crate::error::{E2eError, E2eResult};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%b %d, %Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%b %d, %Y", "%d %b %Y"];

/// Parse a displayed timestamp. Values without an offset are read as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

pub fn expect_timestamp(what: &str, text: &str) -> E2eResult<DateTime<Utc>> {
    parse_timestamp(text)
        .ok_or_else(|| E2eError::assertion(what, "a parseable timestamp", format!("{:?}", text)))
}

/// `message` must contain at least one of `phrases`, ignoring case
pub fn contains_any(what: &str, message: &str, phrases: &[String]) -> E2eResult<()> {
    let haystack = message.to_lowercase();
    if phrases
        .iter()
        .any(|p| !p.is_empty() && haystack.contains(&p.to_lowercase()))
    {
        return Ok(());
    }
    Err(E2eError::assertion(
        what,
        format!("text containing one of {:?}", phrases),
        format!("{:?}", message),
    ))
}

/// Index of the first element that breaks `order`. Equal neighbours never
/// break either order.
pub fn first_order_violation<T: Ord>(values: &[T], order: SortOrder) -> Option<usize> {
    values
        .windows(2)
        .position(|pair| match order {
            SortOrder::NewestFirst => pair[1] > pair[0],
            SortOrder::OldestFirst => pair[1] < pair[0],
        })
        .map(|i| i + 1)
}

/// Every text must parse as a timestamp and the sequence must follow `order`
pub fn expect_sorted(what: &str, texts: &[String], order: SortOrder) -> E2eResult<()> {
    let timestamps = texts
        .iter()
        .map(|t| expect_timestamp(what, t))
        .collect::<E2eResult<Vec<_>>>()?;

    match first_order_violation(&timestamps, order) {
        None => Ok(()),
        Some(i) => Err(E2eError::assertion(
            what,
            format!("rows in {} order", order),
            format!("{:?} followed by {:?} at row {}", texts[i - 1], texts[i], i + 1),
        )),
    }
}

/// Every value must equal `expected`, ignoring case and surrounding space
pub fn expect_all_equal_ci(what: &str, values: &[String], expected: &str) -> E2eResult<()> {
    let expected_lc = expected.trim().to_lowercase();
    match values
        .iter()
        .find(|v| v.trim().to_lowercase() != expected_lc)
    {
        None => Ok(()),
        Some(other) => Err(E2eError::assertion(
            what,
            format!("every value equal to {:?}", expected),
            format!("{:?} among {:?}", other, values),
        )),
    }
}

/// Every element of `subset` must also appear in `superset`
pub fn expect_subset(what: &str, subset: &[String], superset: &[String]) -> E2eResult<()> {
    let known: HashSet<&str> = superset.iter().map(String::as_str).collect();
    let extra: Vec<&String> = subset.iter().filter(|s| !known.contains(s.as_str())).collect();
    if extra.is_empty() {
        Ok(())
    } else {
        Err(E2eError::assertion(
            what,
            "a subset of the unfiltered list",
            format!("unexpected {:?}", extra),
        ))
    }
}

pub fn expect_eq<T: PartialEq + std::fmt::Debug>(what: &str, expected: &T, actual: &T) -> E2eResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(E2eError::assertion(
            what,
            format!("{:?}", expected),
            format!("{:?}", actual),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test_case("2026-10-19 14:03:07" ; "iso with space")]
    #[test_case("2026-10-19T14:03:07Z" ; "rfc3339 utc")]
    #[test_case("2026-10-19T16:03:07+02:00" ; "rfc3339 offset")]
    #[test_case("10/19/2026 2:03:07 PM" ; "us twelve hour")]
    #[test_case("19.10.2026 14:03:07" ; "european")]
    #[test_case("Mon, 19 Oct 2026 14:03:07 +0000" ; "rfc2822")]
    fn test_parses_common_timestamp_layouts(text: &str) {
        let parsed = parse_timestamp(text).unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H:%M:%S").to_string(), "2026-10-19 14:03:07");
    }

    #[test_case("" ; "empty")]
    #[test_case("yesterday" ; "relative")]
    #[test_case("2026-13-45 10:00:00" ; "out of range")]
    fn test_rejects_unparseable_timestamps(text: &str) {
        assert!(parse_timestamp(text).is_none());
    }

    #[test]
    fn test_date_only_reads_as_midnight() {
        let parsed = parse_timestamp("2026-10-19").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-10-19T00:00:00+00:00");
    }

    #[test_case(&[5, 4, 4, 1], SortOrder::NewestFirst, None ; "descending with tie")]
    #[test_case(&[1, 1, 1], SortOrder::NewestFirst, None ; "all equal newest")]
    #[test_case(&[1, 1, 1], SortOrder::OldestFirst, None ; "all equal oldest")]
    #[test_case(&[5, 6, 4], SortOrder::NewestFirst, Some(1) ; "rise breaks newest")]
    #[test_case(&[1, 3, 2], SortOrder::OldestFirst, Some(2) ; "drop breaks oldest")]
    #[test_case(&[], SortOrder::OldestFirst, None ; "empty")]
    fn test_first_order_violation(values: &[i32], order: SortOrder, expected: Option<usize>) {
        assert_eq!(first_order_violation(values, order), expected);
    }

    #[test]
    fn test_expect_sorted_reports_offending_rows() {
        let texts = strings(&["2026-01-01 10:00:00", "2026-03-01 10:00:00"]);
        let err = expect_sorted("created-at", &texts, SortOrder::NewestFirst).unwrap_err();
        match err {
            E2eError::Assertion { actual, .. } => {
                assert!(actual.contains("2026-03-01 10:00:00"));
                assert!(actual.contains("row 2"));
            }
            other => panic!("expected assertion, got {other:?}"),
        }
        assert!(expect_sorted("created-at", &texts, SortOrder::OldestFirst).is_ok());
    }

    #[test]
    fn test_expect_sorted_fails_on_unparseable_cell() {
        let texts = strings(&["2026-01-01 10:00:00", "n/a"]);
        assert!(expect_sorted("created-at", &texts, SortOrder::OldestFirst).is_err());
    }

    #[test]
    fn test_contains_any_ignores_case() {
        let phrases = strings(&["only one", "already exists"]);
        assert!(contains_any("dup", "A group named 'X' ALREADY EXISTS", &phrases).is_ok());
        assert!(contains_any("dup", "Created successfully", &phrases).is_err());
    }

    #[test]
    fn test_all_equal_and_subset() {
        let subjects = strings(&["Chemistry", "chemistry ", "CHEMISTRY"]);
        assert!(expect_all_equal_ci("subject", &subjects, "Chemistry").is_ok());
        assert!(expect_all_equal_ci("subject", &strings(&["Chemistry", "Math"]), "Chemistry").is_err());

        let all = strings(&["A", "B", "C"]);
        assert!(expect_subset("names", &strings(&["A", "C"]), &all).is_ok());
        assert!(expect_subset("names", &strings(&["A", "D"]), &all).is_err());
    }
}
