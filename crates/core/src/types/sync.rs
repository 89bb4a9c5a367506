//! Response body shared by every sync resource.

use serde::{Deserialize, Serialize};

/// Acknowledgement returned to the commerce backend.
///
/// Always sent with HTTP 200. `success` is the only retry signal the backend
/// acts on: `false` means the request itself was unusable, not that some
/// records failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncResponse {
    /// A processed request with no counts attached.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            processed: None,
            failed: None,
            message: None,
        }
    }

    /// A processed batch. Item failures do not make it unsuccessful.
    #[must_use]
    pub const fn batch(processed: usize, failed: usize) -> Self {
        Self {
            success: true,
            processed: Some(processed),
            failed: Some(failed),
            message: None,
        }
    }

    /// A structurally invalid request.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            processed: None,
            failed: None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_serializes_bare_flag() {
        assert_eq!(
            serde_json::to_value(SyncResponse::ok()).ok(),
            Some(json!({"success": true}))
        );
    }

    #[test]
    fn test_batch_keeps_success_with_failures() {
        let value = serde_json::to_value(SyncResponse::batch(3, 1)).ok();
        assert_eq!(
            value,
            Some(json!({"success": true, "processed": 3, "failed": 1}))
        );
    }

    #[test]
    fn test_rejected_carries_message() {
        let response = SyncResponse::rejected("missing email");
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("missing email"));
    }
}
