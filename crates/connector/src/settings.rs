//! Operator settings loaded from a YAML file.
//!
//! Environment variables carry secrets and endpoints; this file carries the
//! editable behavior: how backend failures are presented, and which local
//! store each `X-ACM-UUID` maps to.
//!
//! ## YAML Format
//!
//! ```yaml
//! route_exceptions:
//!   default:
//!     message: "Sorry, something went wrong. Please try again later."
//!     log: true
//!   routes:
//!     product_full_sync:
//!       message: "Product synchronization could not be requested."
//!       redirect: /admin/sync
//!     store_config:
//!       log: false
//!
//! stores:
//!   - acm_uuid: 6a2c3f5e-en
//!     store_id: "1"
//!     store_code: en
//!     website_id: "1"
//!     website_code: base
//!     locale: en_US
//!     currency: USD
//!     description: English storefront
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use commerce_connector_core::{StoreMapping, StoreUuid};

use crate::route_exception::RouteExceptionSettings;

/// Errors loading the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// IO error (file read).
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// YAML parsing failed.
    #[error("failed to parse settings YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two store mappings share an `acm_uuid`.
    #[error("duplicate store mapping for acm_uuid {0}")]
    DuplicateStore(String),
}

/// Full settings file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectorSettings {
    #[serde(default)]
    pub route_exceptions: RouteExceptionSettings,
    #[serde(default)]
    pub stores: Vec<StoreMapping>,
}

impl ConnectorSettings {
    /// Load settings from a YAML file.
    ///
    /// A missing file yields empty settings: no route exception messages and
    /// no store mappings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// declares the same store twice.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Settings file not found, using empty settings");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        let settings = Self::from_yaml(&content)?;
        info!(
            stores = settings.stores.len(),
            routes = settings.route_exceptions.routes.len(),
            "Settings loaded"
        );
        Ok(settings)
    }

    /// Parse settings from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or declares a store twice.
    pub fn from_yaml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };

        for (i, store) in settings.stores.iter().enumerate() {
            if settings
                .stores
                .iter()
                .skip(i + 1)
                .any(|other| other.acm_uuid == store.acm_uuid)
            {
                return Err(SettingsError::DuplicateStore(store.acm_uuid.clone()));
            }
        }

        Ok(settings)
    }

    /// Find the local mapping for a store.
    #[must_use]
    pub fn store(&self, store: &StoreUuid) -> Option<&StoreMapping> {
        self.stores.iter().find(|s| s.acm_uuid == store.as_str())
    }
}
