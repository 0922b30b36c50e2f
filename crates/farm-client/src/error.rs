use thiserror::Error;

/// Errors surfaced by the HTTP device client. Transient network/5xx failures
/// are retried internally (see `retry`); anything that reaches the caller
/// already exhausted its retry budget.
#[derive(Debug, Error)]
pub enum DeviceClientError {
    #[error("transport error talking to device host: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("device host returned unexpected status {status}: {body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("device host response did not match the expected protocol: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, DeviceClientError>;
