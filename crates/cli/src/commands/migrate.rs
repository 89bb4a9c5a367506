//! Database migration command.
//!
//! # Environment Variables
//!
//! - `CONNECTOR_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! Migration files live in `crates/connector/migrations/` and are embedded
//! in the connector library at build time.

use tracing::info;

use commerce_connector::config::ConnectorConfig;
use commerce_connector::db;

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails or
/// a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = ConnectorConfig::database_url_from_env()?;

    info!("Connecting to connector database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running connector migrations...");
    db::migrate(&pool).await?;

    info!("Connector migrations complete!");
    Ok(())
}
