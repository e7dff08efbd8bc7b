//! Client error taxonomy.
//!
//! Every failure a flow can hit maps onto one of four kinds, and all of them
//! are caught at the client boundary and turned into a tagged result or a
//! logged bus event. Nothing here is allowed to take the caller down.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure: unreachable host, connection reset, timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Invalid credentials, a rejected/expired token, or an action the
    /// current role is not allowed to take.
    #[error("not authorized: {0}")]
    Auth(String),

    /// A required form field was missing. Raised before any network call.
    #[error("missing required field: {0}")]
    Validation(&'static str),

    /// The backend answered, but with a non-2xx status or a failure
    /// envelope.
    #[error("backend error: {0}")]
    Backend(String),
}

impl ClientError {
    /// Whether this failure means the device/backend could not be reached
    /// at all (as opposed to answering with a refusal).
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Network(format!("request timed out: {err}"));
        }
        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Self::Auth(format!("backend returned {status}"));
            }
            return Self::Backend(format!("backend returned {status}"));
        }
        Self::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_the_field() {
        let err = ClientError::Validation("email");
        assert_eq!(err.to_string(), "missing required field: email");
    }

    #[test]
    fn test_network_classification() {
        assert!(ClientError::Network("down".into()).is_network());
        assert!(!ClientError::Backend("500".into()).is_network());
    }
}
