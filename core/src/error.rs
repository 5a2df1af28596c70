//! Failure kinds reported by the cloud client.
//!
//! # Design
//! Every call resolves to exactly one [`Outcome`]. Failures are terminal for
//! their call and never retried internally. `ActionFailed` is the one kind that
//! still carries usable data: the device answered, but its function reported
//! `return_value == -1`.

use serde_json::Value;

/// The single result delivered for every operation.
pub type Outcome = Result<Value, Error>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by [`Client`](crate::Client) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required auth material is absent. Raised before any I/O.
    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),

    /// A background task was requested outside a Tokio runtime.
    #[error("no Tokio runtime: {0}")]
    NoRuntime(#[source] tokio::runtime::TryCurrentError),

    /// The request could not be turned into a transport request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The deadline elapsed or the connection was reset by the peer.
    #[error("request timed out")]
    Timeout,

    /// Any other transport-level failure.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The response stream closed before the body was complete.
    #[error("response dropped: {0}")]
    Dropped(String),

    /// The response body is not JSON.
    #[error("invalid response body: {source}")]
    InvalidResponse {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    /// The server answered with a status other than 200.
    #[error("API error (HTTP {status}): {}", .error.as_deref().unwrap_or("unknown"))]
    Api {
        status: u16,
        code: Option<Value>,
        error: Option<String>,
        error_description: Option<String>,
    },

    /// HTTP 200, but the device function returned -1.
    #[error("device function failed")]
    ActionFailed { payload: Value },
}

impl Error {
    /// The parsed response body attached to an `ActionFailed` outcome.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Error::ActionFailed { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_only_on_action_failed() {
        let err = Error::ActionFailed {
            payload: json!({"return_value": -1}),
        };
        assert_eq!(err.payload(), Some(&json!({"return_value": -1})));
        assert!(Error::Timeout.payload().is_none());
    }

    #[test]
    fn api_error_display_uses_error_field() {
        let err = Error::Api {
            status: 404,
            code: Some(json!(404)),
            error: Some("not_found".to_string()),
            error_description: None,
        };
        assert_eq!(err.to_string(), "API error (HTTP 404): not_found");
    }

    #[test]
    fn api_error_display_without_error_field() {
        let err = Error::Api {
            status: 500,
            code: None,
            error: None,
            error_description: None,
        };
        assert_eq!(err.to_string(), "API error (HTTP 500): unknown");
    }
}
