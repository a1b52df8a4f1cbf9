use std::io::Read;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::DownloadConfig;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("server responded with HTTP {status}")]
    Status { status: u16 },

    #[error("response is larger than {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("reading response body: {0}")]
    Body(#[from] std::io::Error),
}

impl FetchError {
    /// Client errors and oversize bodies will not change on retry.
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status } => *status >= 500,
            FetchError::Request(_) | FetchError::Body(_) => true,
            FetchError::InvalidUrl { .. } | FetchError::TooLarge { .. } => false,
        }
    }
}

/// Source of remote file bodies.
pub trait Fetch: Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<F> Fetch for F
where
    F: Fn(&str) -> Result<Vec<u8>, FetchError> + Sync,
{
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self(url)
    }
}

/// Blocking HTTP(S) downloads with a timeout, retries and a size cap.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    retries: u32,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &DownloadConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("structura/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            retries: config.retries,
            max_bytes: config.max_bytes,
        })
    }

    fn fetch_once(&self, url: &url::Url) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }
        let mut body = Vec::new();
        response.take(self.max_bytes + 1).read_to_end(&mut body)?;
        if body.len() as u64 > self.max_bytes {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(body)
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = parse_http_url(url)?;
        let mut attempt = 0;
        loop {
            match self.fetch_once(&parsed) {
                Ok(body) => {
                    debug!(url, bytes = body.len(), "downloaded");
                    return Ok(body);
                }
                Err(e) if attempt < self.retries && e.is_retryable() => {
                    attempt += 1;
                    warn!(url, attempt, error = %e, "download failed, retrying");
                    std::thread::sleep(Duration::from_millis(250 * u64::from(attempt)));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn parse_http_url(url: &str) -> Result<url::Url, FetchError> {
    let invalid = |message: String| FetchError::InvalidUrl {
        url: url.to_string(),
        message,
    };
    let parsed = url::Url::parse(url.trim()).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://example.com/a.txt", true)]
    #[case("http://example.com", true)]
    #[case("ftp://example.com/a", false)]
    #[case("file:///etc/passwd", false)]
    #[case("not a url", false)]
    fn only_http_urls_are_fetched(#[case] url: &str, #[case] ok: bool) {
        assert_eq!(parse_http_url(url).is_ok(), ok);
    }

    #[test]
    fn retry_policy() {
        assert!(FetchError::Status { status: 503 }.is_retryable());
        assert!(!FetchError::Status { status: 404 }.is_retryable());
        assert!(!FetchError::TooLarge { limit: 1 }.is_retryable());
    }

    #[test]
    fn closures_are_fetchers() {
        let fake = |url: &str| -> Result<Vec<u8>, FetchError> { Ok(url.as_bytes().to_vec()) };
        assert_eq!(fake.fetch("x").unwrap(), b"x");
    }

    #[test]
    fn invalid_url_fails_without_network() {
        let fetcher = HttpFetcher::new(&DownloadConfig::default()).unwrap();
        assert!(matches!(
            fetcher.fetch("mailto:someone@example.com"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }
}
