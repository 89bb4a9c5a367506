//! Failure of an outbound call to the commerce backend.

use serde::Serialize;

/// A failed call to the commerce backend.
///
/// Created where the call fails and consumed once by the route exception
/// handler; never persisted. The fields are read-only after construction.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{operation} failed with code {code}: {message}")]
pub struct RouteException {
    operation: String,
    code: u16,
    message: String,
}

impl RouteException {
    /// Code used when no HTTP status was received (connect error, timeout).
    pub const NO_RESPONSE: u16 = 0;

    #[must_use]
    pub fn new(operation: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            code,
            message: message.into(),
        }
    }

    /// Name of the failed backend operation, used as the configuration key.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// HTTP-like status code, or [`Self::NO_RESPONSE`].
    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    /// Diagnostic text (usually the response body).
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_operation_and_code() {
        let err = RouteException::new("store_config", 503, "maintenance");
        assert_eq!(
            err.to_string(),
            "store_config failed with code 503: maintenance"
        );
        assert_eq!(err.operation(), "store_config");
        assert_eq!(err.code(), 503);
        assert_eq!(err.message(), "maintenance");
    }
}
