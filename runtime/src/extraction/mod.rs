//! Listing extraction: property URL grammar and timestamp conversion.
//!
//! Everything here is pure and synchronous; workers call into it once per
//! sitemap `<url>` entry.

pub mod listing;
pub mod timezone;

pub use listing::{parse_listing_url, PropertyListing, LISTING_FIELDS};
