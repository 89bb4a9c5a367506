//! Postgres persistence for the connector.
//!
//! # Database: `commerce_connector`
//!
//! Everything lives in the `connector` schema:
//!
//! - `sku` - Products known locally, keyed on SKU
//! - `sku_stock` - Stock per SKU and store
//! - `promotion` - Promotions keyed on `rule_id`
//! - `promotion_sku` - SKUs a promotion applies to, as last pushed
//! - `promotion_store` - Stores listing each promotion
//! - `sku_promotion` - Promotions currently attached to products
//! - `customer` - Customers, keyed on email (case-insensitive)
//! - `promotion_queue` - Pending attach/detach work
//!
//! Queries are checked at runtime (`sqlx::query`, `sqlx::query_as`), so the
//! crate builds without a live database.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/connector/migrations/` and run via:
//! ```bash
//! cargo run -p commerce-connector-cli -- migrate
//! ```

mod customers;
mod products;
mod promotions;
mod queue;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use customers::PgCustomerManager;
pub use products::PgProductManager;
pub use promotions::PgPromotionsManager;
pub use queue::PgPromotionQueue;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns an error if a migration fails or the recorded history diverges
/// from the embedded migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Check the database answers a trivial query.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), RepositoryError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
