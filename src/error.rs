use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

/// Result type used throughout the SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can fail an SDK operation.
///
/// Only [`Error::NotConfigured`] and [`Error::InvalidJsonValue`] ever fail a resolution call. All
/// transport errors are compensated by the client and surfaced as [`EvaluationError::FetchFailed`]
/// on every affected [`ConfigResult`](crate::ConfigResult).
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Server-backed resolution was requested before [`Client::configure`](crate::Client::configure).
    #[error("couldn't load config because client is not configured")]
    NotConfigured,

    /// Evaluation endpoint built from the configured host is not a valid URL.
    #[error("invalid host configuration")]
    InvalidHost(#[source] url::ParseError),

    /// Server answered with a status other than `200 OK`.
    #[error("Cannot fetch remote config because server error: Unexpected status code")]
    UnexpectedStatus(StatusCode),

    /// Network or response body error.
    #[error("Cannot fetch remote config because server error: {0}")]
    // reqwest::Error is not clonable, so we're wrapping it in an Arc.
    Network(Arc<reqwest::Error>),

    /// Failure reported by a custom [`RemoteFetcher`](crate::RemoteFetcher).
    #[error("{0}")]
    Fetch(String),

    /// Server returned a `json` value that is not valid JSON.
    #[error("server returned malformed JSON for remote config {name:?}")]
    InvalidJsonValue {
        /// Name of the remote config.
        name: String,
        /// Underlying parse error.
        #[source]
        source: Arc<serde_json::Error>,
    },
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

/// Reason a resolved config did not come fresh from the server.
///
/// Attached to [`ConfigResult::error`](crate::ConfigResult::error). The `Display` output is the
/// error tag: `ConfigNotFound`, the tag reported by the server, or the transport error message.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum EvaluationError {
    /// The server did not return the requested name.
    #[error("ConfigNotFound")]
    ConfigNotFound,

    /// The server reported an evaluation failure for this name.
    #[error("{0}")]
    Reported(String),

    /// The server returned a value of the wrong type for a feature toggle.
    #[error("TypeMismatch")]
    TypeMismatch,

    /// The whole batch request failed.
    #[error(transparent)]
    FetchFailed(Error),
}

impl EvaluationError {
    /// Map an error tag reported by the server.
    pub(crate) fn from_tag(tag: &str) -> EvaluationError {
        match tag {
            "ConfigNotFound" => EvaluationError::ConfigNotFound,
            other => EvaluationError::Reported(other.to_owned()),
        }
    }
}
