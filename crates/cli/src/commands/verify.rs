//! Store mapping verification from the command line.

use tracing::{error, info};

use commerce_connector_core::StoreUuid;

/// Verify one store mapping and print the report as JSON.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the backend call fails or
/// the mapping does not pass.
pub async fn run(store: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (_, state) = super::connector_state().await?;
    let store = StoreUuid::new(store);

    let report = state.verifier().verify(&store).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if report.passed_verification {
        info!(store = %store, "Store mapping verified");
        Ok(())
    } else {
        error!(store = %store, advice = %report.system_advice, "Store mapping does not match");
        Err(format!("verification failed for {store}").into())
    }
}
