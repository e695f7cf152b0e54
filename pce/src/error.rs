use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PceError {
    #[error("Policy controller did not answer in time")]
    Timeout,

    #[error("Policy controller request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Policy controller returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Unexpected policy controller response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Policy controller is not configured: {0}")]
    Config(String),
}

impl PceError {
    /// Whether the caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<reqwest::Error> for PceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }
}
