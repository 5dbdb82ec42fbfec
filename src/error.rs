use thiserror::Error;

#[derive(Error, Debug)]
pub enum CtlError {
    #[error("no episodes found in response")]
    NoEpisodesFound,

    #[error("no suitable token candidate found")]
    NoSuitableToken,

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Browser(String),

    #[error("{0}")]
    Player(String),

    #[error("{0}")]
    Usage(String),

    #[error("canceled")]
    Canceled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}

impl CtlError {
    /// Timeouts are the only failures worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CtlError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, CtlError>;
