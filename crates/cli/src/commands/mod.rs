//! CLI command implementations.

pub mod migrate;
pub mod queue;
pub mod seed;
pub mod verify;

use commerce_connector::config::ConnectorConfig;
use commerce_connector::settings::ConnectorSettings;
use commerce_connector::state::{AppState, Services};
use commerce_connector::db;

/// Build the same state the server uses, without the HTTP layer.
async fn connector_state() -> Result<(ConnectorConfig, AppState), Box<dyn std::error::Error>> {
    let config = ConnectorConfig::from_env()?;
    let settings = ConnectorSettings::load(&config.settings_path).await?;
    let pool = db::create_pool(&config.database_url).await?;
    let services = Services::postgres(&config, &settings, &pool)?;
    let state = AppState::new(settings, services, Some(pool));
    Ok((config, state))
}
