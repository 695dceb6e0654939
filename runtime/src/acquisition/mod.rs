//! Sitemap acquisition: fetching, decoding, parsing and parent resolution.

pub mod fetcher;
pub mod resolver;
pub mod retry;
pub mod sitemap;

pub use fetcher::{DocumentSource, FetchedDocument, SitemapFetcher};
pub use resolver::{ChildSitemapTask, SitemapResolver};
pub use retry::RetryPolicy;
