//! Known Zillow parent sitemaps.

use crate::config::CategorySource;
use serde::Serialize;

const INDEX_BASE: &str = "https://www.zillow.com/xml/indexes/us";

/// Which family of detail pages a category indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryGroup {
    /// Home detail pages.
    Hdp,
    /// Building detail pages.
    Bdp,
}

impl CategoryGroup {
    fn path(&self) -> &'static str {
        match self {
            Self::Hdp => "hdp",
            Self::Bdp => "bdp",
        }
    }
}

/// One entry of the built-in catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownCategory {
    pub label: &'static str,
    pub display_name: &'static str,
    pub group: CategoryGroup,
    #[serde(rename = "sitemapURL")]
    pub sitemap_url: String,
}

impl KnownCategory {
    pub fn source(&self) -> CategorySource {
        CategorySource::new(self.label, self.sitemap_url.clone())
    }
}

const ENTRIES: &[(&str, &str, CategoryGroup)] = &[
    ("for-sale-by-agent", "For Sale by Agent", CategoryGroup::Hdp),
    ("for-sale-by-owner", "For Sale by Owner", CategoryGroup::Hdp),
    ("new-construction", "New Construction", CategoryGroup::Hdp),
    ("auction", "Auction", CategoryGroup::Hdp),
    ("pending", "Pending", CategoryGroup::Hdp),
    ("recently-sold", "Recently Sold", CategoryGroup::Hdp),
    ("for-rent", "For Rent", CategoryGroup::Hdp),
    ("off-market", "Off Market", CategoryGroup::Hdp),
    ("other", "Other", CategoryGroup::Hdp),
    ("buildings", "Buildings", CategoryGroup::Bdp),
    ("apartments", "Apartments", CategoryGroup::Bdp),
];

/// Every built-in category, in display order.
pub fn known_categories() -> Vec<KnownCategory> {
    ENTRIES
        .iter()
        .map(|&(label, display_name, group)| KnownCategory {
            label,
            display_name,
            group,
            sitemap_url: format!("{INDEX_BASE}/{}/{label}.xml.gz", group.path()),
        })
        .collect()
}

/// Look up a built-in category by label.
pub fn find(label: &str) -> Option<KnownCategory> {
    known_categories().into_iter().find(|c| c.label == label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_urls() {
        let all = known_categories();
        assert_eq!(all.len(), 11);
        assert_eq!(
            find("for-rent").unwrap().sitemap_url,
            "https://www.zillow.com/xml/indexes/us/hdp/for-rent.xml.gz"
        );
        assert_eq!(
            find("apartments").unwrap().sitemap_url,
            "https://www.zillow.com/xml/indexes/us/bdp/apartments.xml.gz"
        );
        assert!(find("castles").is_none());
    }

    #[test]
    fn test_catalog_sources_form_a_valid_config() {
        let sources = known_categories().iter().map(KnownCategory::source).collect();
        crate::config::JobConfig::new("/tmp", sources).validate().unwrap();
    }
}
