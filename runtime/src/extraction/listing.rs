//! Turn a listing URL from a child sitemap into a [`PropertyListing`].
//!
//! Grammar: `.../<slug>/<digits>_zpid/` where the slug is hyphen-delimited
//! and ends in `STATE-ZIPCODE`. The token right before the state is the
//! city; every earlier token belongs to the street address. Multi-word city
//! names are therefore split wrongly ("Salt-Lake-City" yields city "City");
//! the heuristic is kept as-is.

use crate::error::ParseError;
use crate::extraction::timezone;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Column order shared by the CSV header and the JSON object layout.
pub const LISTING_FIELDS: [&str; 8] = [
    "property_id",
    "listing_url",
    "address",
    "city",
    "state",
    "zipcode",
    "last_modified",
    "last_modified_est",
];

/// One property extracted from a sitemap `<url>` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyListing {
    pub property_id: String,
    pub listing_url: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    /// `<lastmod>` text exactly as published (UTC, ISO-8601), or empty.
    pub last_modified: String,
    /// `last_modified` rendered in US/Eastern, or empty if unparsable.
    pub last_modified_est: String,
}

fn zpid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)_zpid$").expect("zpid regex is valid"))
}

fn slug_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.+?)-([A-Z]{2})-(\d{5})$").expect("slug regex is valid")
    })
}

/// Parse a listing URL and its optional `<lastmod>` value.
pub fn parse_listing_url(
    listing_url: &str,
    last_modified: Option<&str>,
) -> Result<PropertyListing, ParseError> {
    let parsed = url::Url::parse(listing_url.trim())
        .map_err(|_| ParseError::InvalidUrl(listing_url.to_string()))?;

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let zpid_at = segments
        .iter()
        .rposition(|seg| zpid_regex().is_match(seg))
        .ok_or_else(|| ParseError::MissingZpid(listing_url.to_string()))?;

    let property_id = zpid_regex()
        .captures(segments[zpid_at])
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ParseError::MissingZpid(listing_url.to_string()))?;

    let slug = zpid_at
        .checked_sub(1)
        .map(|i| segments[i])
        .ok_or_else(|| ParseError::MalformedSlug(listing_url.to_string()))?;

    let caps = slug_regex()
        .captures(slug)
        .ok_or_else(|| ParseError::MalformedSlug(listing_url.to_string()))?;

    let mut tokens: Vec<&str> = caps[1].split('-').filter(|t| !t.is_empty()).collect();
    let city = tokens.pop().unwrap_or_default().to_string();
    let address = tokens.join(" ");

    let last_modified = last_modified.map(str::trim).unwrap_or_default();

    Ok(PropertyListing {
        property_id,
        listing_url: listing_url.trim().to_string(),
        address,
        city,
        state: caps[2].to_string(),
        zipcode: caps[3].to_string(),
        last_modified: last_modified.to_string(),
        last_modified_est: timezone::format_us_eastern(last_modified),
    })
}
