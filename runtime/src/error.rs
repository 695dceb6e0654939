//! Error taxonomy for the extraction engine.
//!
//! Only [`ExtractError::Resolution`], [`ExtractError::Write`] and
//! [`ExtractError::Config`] ever reach the job phase. Fetch and parse faults
//! are absorbed at task and row level.

use std::path::PathBuf;
use thiserror::Error;

/// A sitemap document could not be retrieved after the retry budget.
#[derive(Debug, Clone, Error)]
#[error("fetch {url} failed after {attempts} attempt(s): {reason}")]
pub struct FetchError {
    pub url: String,
    pub attempts: u32,
    pub reason: String,
}

/// A listing URL does not follow the `<slug>/<digits>_zpid/` grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("not a valid URL: {0}")]
    InvalidUrl(String),
    #[error("no <digits>_zpid segment in {0}")]
    MissingZpid(String),
    #[error("slug does not end in STATE-ZIPCODE: {0}")]
    MalformedSlug(String),
}

/// Errors that abort or reject a whole job.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid job configuration: {0}")]
    Config(String),

    #[error("failed to resolve parent sitemap {url}: {reason}")]
    Resolution { url: String, reason: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("an extraction job is already running")]
    AlreadyRunning,
}

impl ExtractError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        Self::Write {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Whether this error should move the job into the FAILED phase.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Fetch(_) | Self::Parse(_))
    }
}

pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_matches_propagation_policy() {
        let fetch = ExtractError::from(FetchError {
            url: "https://example.com/a.xml.gz".into(),
            attempts: 3,
            reason: "HTTP 503".into(),
        });
        assert!(!fetch.is_fatal());
        assert!(!ExtractError::from(ParseError::MissingZpid("x".into())).is_fatal());
        assert!(ExtractError::Config("no categories".into()).is_fatal());
        assert!(ExtractError::write(
            "/tmp/out.csv",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full")
        )
        .is_fatal());
    }

    #[test]
    fn test_fetch_error_message() {
        let err = FetchError {
            url: "https://example.com/a.xml".into(),
            attempts: 3,
            reason: "timed out".into(),
        };
        assert_eq!(
            err.to_string(),
            "fetch https://example.com/a.xml failed after 3 attempt(s): timed out"
        );
    }
}
