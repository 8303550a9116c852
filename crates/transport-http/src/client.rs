// HTTP client configuration and request helpers

use nowplay_core::{EngineFailure, PlayerError};
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;

/// Transport settings shared by every request of an engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub user_agent: String,
    pub redirects: u32,
    /// Bytes fetched per Range request
    pub chunk_size: usize,
    /// Upper bound of the Range source's chunk cache
    pub cache_size: usize,
    /// Extra attempts for the initial request of a source
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 30_000,
            read_timeout_ms: 60_000,
            user_agent: "Mozilla/5.0 (compatible; Nowplay/0.1)".to_string(),
            redirects: 10,
            chunk_size: 256 * 1024,
            cache_size: 10 * 1024 * 1024,
            max_retries: 2,
        }
    }
}

impl HttpConfig {
    pub fn validate(&self) -> nowplay_core::Result<()> {
        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 {
            return Err(PlayerError::Configuration(
                "HTTP timeouts must be positive".to_string(),
            ));
        }
        if self.chunk_size == 0 || self.cache_size < self.chunk_size {
            return Err(PlayerError::Configuration(format!(
                "cacheSize ({}) must hold at least one chunk ({})",
                self.cache_size, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Create a configured HTTP agent
pub fn create_http_agent(config: &HttpConfig) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_millis(config.connect_timeout_ms))
        .timeout_read(Duration::from_millis(config.read_timeout_ms))
        .timeout_write(Duration::from_millis(config.connect_timeout_ms))
        .user_agent(&config.user_agent)
        .redirects(config.redirects)
        .build()
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} ignored the Range request for offset {offset}")]
    RangeIgnored { url: String, offset: u64 },

    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

impl HttpError {
    fn from_ureq(url: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, _) => HttpError::Status {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(transport) => HttpError::Transport {
                url: url.to_string(),
                reason: transport.to_string(),
            },
        }
    }

    /// Failure class reported to the controller
    pub fn failure(&self) -> EngineFailure {
        match self {
            HttpError::Status {
                status: 406 | 415, ..
            } => EngineFailure::UnsupportedFormat,
            _ => EngineFailure::NetworkFailure,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            HttpError::Transport { .. } => true,
            HttpError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Wrap for `Read`/`Seek` implementations. The error stays recoverable
    /// through [`failure_of`].
    pub fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::Other, self)
    }
}

impl From<HttpError> for PlayerError {
    fn from(err: HttpError) -> Self {
        PlayerError::Engine(err.failure())
    }
}

pub type Result<T> = std::result::Result<T, HttpError>;

/// Failure class of an I/O error raised by one of this crate's sources
pub fn failure_of(err: &io::Error) -> Option<EngineFailure> {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<HttpError>())
        .map(HttpError::failure)
}

/// HTTP client wrapper
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            agent: create_http_agent(&config),
            config,
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// GET with exponential backoff on transport and server errors
    pub fn get(&self, url: &str) -> Result<ureq::Response> {
        self.with_retries(url, || self.agent.get(url).call())
    }

    pub fn get_range(&self, url: &str, start: u64, end: Option<u64>) -> Result<ureq::Response> {
        let range = match end {
            Some(e) => format!("bytes={}-{}", start, e),
            None => format!("bytes={}-", start),
        };
        self.agent
            .get(url)
            .set("Range", &range)
            .call()
            .map_err(|e| HttpError::from_ureq(url, e))
    }

    pub fn head(&self, url: &str) -> Result<ureq::Response> {
        self.with_retries(url, || self.agent.head(url).call())
    }

    fn with_retries(
        &self,
        url: &str,
        request: impl Fn() -> std::result::Result<ureq::Response, ureq::Error>,
    ) -> Result<ureq::Response> {
        let mut attempt = 0;
        loop {
            match request() {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let err = HttpError::from_ureq(url, e);
                    if attempt >= self.config.max_retries || !err.is_retryable() {
                        return Err(err);
                    }
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    log::warn!("{} (attempt {}), retrying after {:?}", err, attempt + 1, delay);
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(HttpConfig::default())
    }
}

pub(crate) fn content_length(response: &ureq::Response) -> Option<u64> {
    response
        .header("Content-Length")
        .and_then(|s| s.trim().parse::<u64>().ok())
}
