//! Seed the catalog with SKUs and customers.
//!
//! Stock and promotion pushes only apply to SKUs the connector knows, and
//! customer deletion only finds registered customers. This command registers
//! both from a YAML file:
//!
//! ```yaml
//! skus:
//!   - M-100
//!   - M-101
//! customers:
//!   - jane@example.com
//! ```
//!
//! Seeding is idempotent: existing SKUs and customers are left in place.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use commerce_connector::config::ConnectorConfig;
use commerce_connector::db::{self, PgCustomerManager, PgProductManager};
use commerce_connector_core::Email;

/// Contents of a seed file.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub skus: Vec<String>,
    #[serde(default)]
    pub customers: Vec<String>,
}

impl SeedFile {
    /// Entries that cannot be registered, as messages.
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for sku in &self.skus {
            if sku.trim().is_empty() {
                errors.push("blank SKU".to_owned());
            }
        }
        for customer in &self.customers {
            if let Err(e) = Email::parse(customer) {
                errors.push(format!("{customer:?}: {e}"));
            }
        }
        errors
    }
}

/// Register every SKU and customer of a seed file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or validated, or a database
/// operation fails.
pub async fn run(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let errors = seed.validate();
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let database_url = ConnectorConfig::database_url_from_env()?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let products = PgProductManager::new(pool.clone());
    for sku in &seed.skus {
        products.register_sku(sku.trim()).await?;
    }

    let customers = PgCustomerManager::new(pool);
    for customer in &seed.customers {
        customers.register(&Email::parse(customer)?).await?;
    }

    info!("Seeding complete!");
    info!("  SKUs registered: {}", seed.skus.len());
    info!("  Customers registered: {}", seed.customers.len());
    Ok(())
}
