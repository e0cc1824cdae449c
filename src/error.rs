use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a documentation lookup.
///
/// The provider client produces these, the resolver passes them through
/// untouched and each interface adapter renders them in its own protocol.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Provider rejected the API key")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Provider rate limit exceeded{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Documentation provider unavailable: {0}")]
    ProviderUnavailable(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    }
}

/// Serializable tag of a [`LookupError`], shared by the HTTP and tool error bodies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRequest,
    Unauthorized,
    NotFound,
    RateLimited,
    ProviderUnavailable,
}

impl LookupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::ProviderUnavailable(message.into())
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::ProviderUnavailable("request to provider timed out".to_string())
        } else {
            Self::ProviderUnavailable(err.to_string())
        }
    }
}

impl ErrorKind {
    /// HTTP status code used by the request gateway.
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidRequest => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::RateLimited => 429,
            Self::ProviderUnavailable => 502,
        }
    }

    /// JSON-RPC error code used by the tool protocol.
    ///
    /// Caller errors share the standard invalid-params code; the rest use the
    /// implementation-defined server range.
    pub fn rpc_code(self) -> i32 {
        match self {
            Self::InvalidRequest => -32602,
            Self::Unauthorized => -32001,
            Self::NotFound => -32002,
            Self::RateLimited => -32029,
            Self::ProviderUnavailable => -32003,
        }
    }
}
