//! `<lastmod>` parsing and US/Eastern rendering.
//!
//! Conversion goes through the IANA `America/New_York` zone, so historical
//! daylight-saving rules (pre-2007 April/October transitions included) apply.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::America::New_York;
use chrono_tz::OffsetComponents;

/// Parse a sitemap `<lastmod>` value into UTC.
///
/// Accepts RFC 3339 (with `Z` or an explicit offset), a naive
/// `YYYY-MM-DDTHH:MM:SS` taken as UTC, and a bare date.
pub fn parse_lastmod(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Whether US daylight time is in effect in New York at the given instant.
pub fn is_us_daylight_time(at: DateTime<Utc>) -> bool {
    at.with_timezone(&New_York).offset().dst_offset() != Duration::zero()
}

/// Render a raw `<lastmod>` as `YYYY-MM-DD HH:MM:SS EST|EDT`, or an empty
/// string when it cannot be parsed.
pub fn format_us_eastern(raw: &str) -> String {
    match parse_lastmod(raw) {
        Some(utc) => utc
            .with_timezone(&New_York)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string(),
        None => String::new(),
    }
}
