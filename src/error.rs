use thiserror::Error;

/// Failure of a single upstream operation. Recorded as its display string.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("{what}")]
    Parse { what: String },
}

impl FetchError {
    pub fn parse(what: impl Into<String>) -> Self {
        FetchError::Parse { what: what.into() }
    }

    pub fn network(url: &str, err: impl std::fmt::Display) -> Self {
        FetchError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, FetchError::Parse { .. })
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
