//! Error types for the REST client

use ha_entity::ActuatorError;
use reqwest::StatusCode;
use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors talking to the Home Assistant REST API
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl From<ClientError> for ActuatorError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status { status, body, .. } => ActuatorError::Status {
                status: status.as_u16(),
                body,
            },
            other => ActuatorError::Transport(other.to_string()),
        }
    }
}
