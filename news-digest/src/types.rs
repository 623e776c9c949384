// Contract types live in the interfaces crate; re-export them for convenience.
pub use interfaces::defs::{
    DigestDocument, DigestEntry, RawArticle, RunError, RunMetrics, ScoredArticle, Selector,
    SelectorSet, SourceDescriptor, SourceKind, Stage, Summary, TrendTopic,
};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("No fetch adapter registered for {0} sources")]
    NoAdapter(SourceKind),
}

impl FetchError {
    /// Timeouts, connection failures, 429 and 5xx responses are worth retrying.
    /// Everything else fails the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Http(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    return true;
                }
                e.status()
                    .map(|s| s.is_server_error() || s.as_u16() == 429)
                    .unwrap_or(false)
            }
            FetchError::Parse(_)
            | FetchError::Selector { .. }
            | FetchError::InvalidUrl(_)
            | FetchError::NoAdapter(_) => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SummarizationError {
    #[error("Provider error ({status:?}): {message}")]
    Provider { status: Option<u16>, message: String },

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Provider quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SummarizationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SummarizationError::RateLimited => true,
            SummarizationError::Provider { status, .. } => {
                matches!(status, Some(s) if *s >= 500)
            }
            SummarizationError::Http(e) => e.is_timeout() || e.is_connect(),
            SummarizationError::QuotaExhausted(_) | SummarizationError::MalformedResponse(_) => false,
        }
    }

    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, SummarizationError::QuotaExhausted(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Channel rejected post: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Summarization error: {0}")]
    Summarization(#[from] SummarizationError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, DigestError>;
