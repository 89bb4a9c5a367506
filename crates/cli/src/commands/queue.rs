//! Promotion queue commands.
//!
//! `run` claims items with the same lease as the server's runner, so both
//! can work the queues at the same time without taking the same item.

use tracing::info;

use commerce_connector_core::QueueName;

/// Process one batch from each queue and report the outcome.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the queue storage fails.
pub async fn run_once() -> Result<(), Box<dyn std::error::Error>> {
    let (config, state) = super::connector_state().await?;

    let summary = state.queue_runner(config.queue).run_once().await?;

    info!("Queue run complete!");
    info!("  Processed: {}", summary.processed);
    info!("  Requeued: {}", summary.requeued);
    info!("  Failed: {}", summary.failed);
    Ok(())
}

/// Show how many items wait in each queue.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the queue storage fails.
pub async fn status() -> Result<(), Box<dyn std::error::Error>> {
    let (_, state) = super::connector_state().await?;

    info!("Promotion queues");
    info!("================");
    for name in [QueueName::Attach, QueueName::Detach] {
        let items = state.queue().pending(name).await?;
        let retried = items.iter().filter(|item| item.attempts > 0).count();
        info!("  {name}: {} pending ({retried} retried)", items.len());
    }
    Ok(())
}
