use thiserror::Error;

/// Failure of a single keyed fetch. Cloned into every cache snapshot that
/// reports it, so it carries messages rather than source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request failed: {message}")]
    Network {
        status: Option<u16>,
        message: String,
    },
    #[error("unexpected response: {0}")]
    Malformed(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        FetchError::Network {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        if status == 404 {
            return FetchError::NotFound(message.into());
        }
        FetchError::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::NotFound(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return FetchError::Malformed(err.to_string());
        }
        match err.status() {
            Some(status) => FetchError::status(status.as_u16(), err.to_string()),
            None => FetchError::network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}
