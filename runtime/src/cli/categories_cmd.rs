//! `harvester categories`: list the built-in parent sitemaps.

use crate::catalog::{known_categories, CategoryGroup};
use crate::cli::output::{self, Styled};
use anyhow::Result;

pub fn run() -> Result<()> {
    let categories = known_categories();

    if output::is_json() {
        output::print_json(&serde_json::to_value(&categories)?);
        return Ok(());
    }

    let s = Styled::new();
    output::print_header(&s);
    for (group, title) in [
        (CategoryGroup::Hdp, "Home detail pages"),
        (CategoryGroup::Bdp, "Building detail pages"),
    ] {
        output::print_section(&s, title);
        for category in categories.iter().filter(|c| c.group == group) {
            eprintln!("    {:<20} {}", category.label, s.dim(&category.sitemap_url));
        }
        eprintln!();
    }
    eprintln!("  Select with --category <label>, --category <label>=<url>, or --all.");
    Ok(())
}
