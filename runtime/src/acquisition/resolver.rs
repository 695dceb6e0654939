//! Expand parent sitemap indexes into per-category child sitemap tasks.

use crate::acquisition::fetcher::DocumentSource;
use crate::acquisition::sitemap::{child_sitemaps, parse_sitemap};
use crate::config::CategorySource;
use crate::error::{ExtractError, ExtractResult};
use std::sync::Arc;
use tracing::info;

/// One unit of work: a child sitemap tagged with the category it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSitemapTask {
    pub category: String,
    pub url: String,
}

/// Resolves categories to their child sitemaps through a [`DocumentSource`].
#[derive(Clone)]
pub struct SitemapResolver {
    source: Arc<dyn DocumentSource>,
}

impl SitemapResolver {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self { source }
    }

    /// Child sitemap URLs listed by a parent sitemap index, in document order.
    ///
    /// An unreachable or malformed parent, or one that lists no children, is
    /// a resolution error.
    pub async fn child_urls(&self, parent_url: &str) -> ExtractResult<Vec<String>> {
        let doc = self
            .source
            .fetch(parent_url)
            .await
            .map_err(|e| resolution(parent_url, e.to_string()))?;

        let entries = parse_sitemap(&doc.body).map_err(|e| resolution(parent_url, e.to_string()))?;
        let children = child_sitemaps(&entries);
        if children.is_empty() {
            return Err(resolution(parent_url, "sitemap index lists no child sitemaps"));
        }
        Ok(children)
    }

    /// Tasks for one category.
    pub async fn resolve(&self, category: &CategorySource) -> ExtractResult<Vec<ChildSitemapTask>> {
        let children = self.child_urls(&category.sitemap_url).await?;
        info!(
            category = %category.label,
            children = children.len(),
            "resolved category sitemap index"
        );
        Ok(children
            .into_iter()
            .map(|url| ChildSitemapTask {
                category: category.label.clone(),
                url,
            })
            .collect())
    }

    /// Tasks for every category, grouped by category in selection order.
    pub async fn resolve_all(
        &self,
        categories: &[CategorySource],
    ) -> ExtractResult<Vec<ChildSitemapTask>> {
        let mut tasks = Vec::new();
        for category in categories {
            tasks.extend(self.resolve(category).await?);
        }
        Ok(tasks)
    }
}

fn resolution(url: &str, reason: impl Into<String>) -> ExtractError {
    ExtractError::Resolution {
        url: url.to_string(),
        reason: reason.into(),
    }
}
