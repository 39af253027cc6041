use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("blocked by remote site (HTTP {status})")]
    Blocked { status: u16 },

    #[error("unexpected HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ReadError {
    /// Whether a retry with backoff is worthwhile. Connection blips,
    /// timeouts and server-side errors are transient; 403/429 means the
    /// site's anti-bot countermeasures fired and retrying immediately
    /// only digs the hole deeper.
    pub fn is_transient(&self) -> bool {
        match self {
            ReadError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ReadError::Status { status, .. } => *status >= 500,
            ReadError::Blocked { .. } => false,
            ReadError::InvalidUrl(_) => false,
            ReadError::ParseError(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReadError>;
