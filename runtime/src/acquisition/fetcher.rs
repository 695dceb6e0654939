//! Retrying, decompressing sitemap fetcher.

use crate::acquisition::retry::{retry_with_backoff, RetryDisposition, RetryPolicy};
use crate::error::{ExtractError, ExtractResult, FetchError};
use crate::stealth::fingerprint::pick_user_agent;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-attempt request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A sitemap document as bytes, plus how hard it was to get.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub url: String,
    /// Decompressed XML.
    pub body: Vec<u8>,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// Failure reason of every attempt that was retried.
    pub retried: Vec<String>,
}

/// Anything that can hand out sitemap documents by URL.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError>;
}

/// Outcome of a single HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttemptError {
    /// Timeout, connection failure, 5xx, 429.
    Transient(String),
    /// 4xx, undecodable body. Retrying would not help.
    Permanent(String),
}

impl AttemptError {
    fn reason(&self) -> &str {
        match self {
            Self::Transient(r) | Self::Permanent(r) => r,
        }
    }
}

/// HTTP implementation of [`DocumentSource`].
pub struct SitemapFetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl SitemapFetcher {
    /// Create a fetcher with the standard 30s timeout.
    pub fn new(policy: RetryPolicy) -> ExtractResult<Self> {
        Self::with_timeout(policy, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(policy: RetryPolicy, timeout: Duration) -> ExtractResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, policy })
    }

    async fn attempt(&self, url: &str) -> Result<Vec<u8>, AttemptError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, pick_user_agent())
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(AttemptError::Permanent(format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AttemptError::Transient(format!("reading body: {e}")))?;

        decode_body(&bytes).map_err(AttemptError::Permanent)
    }
}

#[async_trait]
impl DocumentSource for SitemapFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let mut retried = Vec::new();

        let outcome = retry_with_backoff(
            self.policy,
            |attempt| {
                debug!(url, attempt, "fetching sitemap");
                self.attempt(url)
            },
            |attempt, backoff, err: &AttemptError| {
                warn!(
                    url,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "sitemap fetch failed, retrying: {}",
                    err.reason()
                );
                retried.push(err.reason().to_string());
            },
            |err| match err {
                AttemptError::Transient(_) => RetryDisposition::Retry,
                AttemptError::Permanent(_) => RetryDisposition::Abort,
            },
        )
        .await;

        match outcome {
            Ok((body, attempts)) => Ok(FetchedDocument {
                url: url.to_string(),
                body,
                attempts,
                retried,
            }),
            Err(failure) => Err(FetchError {
                url: url.to_string(),
                attempts: failure.attempts,
                reason: failure.error.reason().to_string(),
            }),
        }
    }
}

fn classify_transport_error(err: &reqwest::Error) -> AttemptError {
    if err.is_timeout() {
        AttemptError::Transient("request timed out".to_string())
    } else if err.is_connect() || err.is_request() || err.is_body() {
        AttemptError::Transient(err.to_string())
    } else if err.is_builder() {
        AttemptError::Permanent(err.to_string())
    } else {
        AttemptError::Transient(err.to_string())
    }
}

/// Gunzip the body when it carries the gzip magic number, else pass it through.
pub fn decode_body(bytes: &[u8]) -> Result<Vec<u8>, String> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::with_capacity(bytes.len() * 4);
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| format!("gzip decode failed: {e}"))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn fetcher() -> SitemapFetcher {
        SitemapFetcher::new(RetryPolicy::immediate(3)).unwrap()
    }

    #[test]
    fn test_decode_plain_and_gzip() {
        let xml = b"<urlset></urlset>";
        assert_eq!(decode_body(xml).unwrap(), xml);
        assert_eq!(decode_body(&gzip(xml)).unwrap(), xml);
        assert!(decode_body(&[0x1f, 0x8b, 0x00]).is_err());
    }

    #[tokio::test]
    async fn test_fetch_gzip_body() {
        let server = MockServer::start().await;
        let xml = b"<sitemapindex><sitemap><loc>https://x/a.xml.gz</loc></sitemap></sitemapindex>";
        Mock::given(method("GET"))
            .and(path("/index.xml.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(xml)))
            .mount(&server)
            .await;

        let doc = fetcher()
            .fetch(&format!("{}/index.xml.gz", server.uri()))
            .await
            .unwrap();
        assert_eq!(doc.body, xml);
        assert_eq!(doc.attempts, 1);
        assert!(doc.retried.is_empty());
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/child.xml"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/child.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<urlset/>"))
            .with_priority(2)
            .mount(&server)
            .await;

        let doc = fetcher()
            .fetch(&format!("{}/child.xml", server.uri()))
            .await
            .unwrap();
        assert_eq!(doc.attempts, 3);
        assert_eq!(doc.retried.len(), 2);
        assert!(doc.retried[0].contains("503"));
    }

    #[tokio::test]
    async fn test_gives_up_after_three_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/down.xml", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(err.reason.contains("500"));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/missing.xml", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
    }

    #[tokio::test]
    async fn test_sends_bot_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<urlset/>"))
            .expect(1)
            .mount(&server)
            .await;

        fetcher()
            .fetch(&format!("{}/ua.xml", server.uri()))
            .await
            .unwrap();
        let received = server.received_requests().await.unwrap();
        let ua = received[0].headers.get("user-agent").unwrap().to_str().unwrap();
        assert!(ua.contains("Googlebot"));
    }
}
