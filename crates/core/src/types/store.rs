//! Store (tenant) identifier carried by every sync call.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Header the commerce backend uses to name the originating store.
pub const ACM_UUID_HEADER: &str = "x-acm-uuid";

/// Identifier of the storefront/locale a payload applies to.
///
/// An absent header is represented by the empty value, which means
/// "unspecified store" rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreUuid(String);

impl StoreUuid {
    /// Build a store identifier from a raw header value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_owned())
    }

    /// The "unspecified store" identifier.
    #[must_use]
    pub const fn unspecified() -> Self {
        Self(String::new())
    }

    /// Whether no store was named.
    #[must_use]
    pub fn is_unspecified(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unspecified() {
            write!(f, "(unspecified)")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for StoreUuid {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_header_is_unspecified() {
        assert!(StoreUuid::new("  ").is_unspecified());
        assert_eq!(StoreUuid::new("  ").as_str(), "");
        assert_eq!(StoreUuid::unspecified().to_string(), "(unspecified)");
    }

    #[test]
    fn test_value_is_trimmed() {
        let store = StoreUuid::from(" 5c1b-store ");
        assert_eq!(store.as_str(), "5c1b-store");
        assert!(!store.is_unspecified());
    }
}
