//! Background processing of the promotion queues.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

use super::{
    AttachPromotionWorker, DetachPromotionWorker, PromotionQueue, PromotionQueueBase,
    PromotionQueueWorker, QueueError, QueueItem, WorkerError,
};
use crate::config::QueueConfig;
use crate::route_exception::RouteExceptionHandler;

/// Counts from one pass over the queues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Items processed and removed.
    pub processed: usize,
    /// Items released for redelivery.
    pub requeued: usize,
    /// Items that ran out of attempts.
    pub failed: usize,
}

impl RunSummary {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.processed == 0 && self.requeued == 0 && self.failed == 0
    }
}

/// Claims queue items and hands them to their workers.
pub struct QueueRunner {
    queue: Arc<dyn PromotionQueue>,
    workers: Vec<Arc<dyn PromotionQueueWorker>>,
    handler: Arc<RouteExceptionHandler>,
    config: QueueConfig,
}

impl QueueRunner {
    /// A runner with the attach and detach promotion workers.
    #[must_use]
    pub fn new(
        queue: Arc<dyn PromotionQueue>,
        base: &PromotionQueueBase,
        handler: Arc<RouteExceptionHandler>,
        config: QueueConfig,
    ) -> Self {
        Self {
            queue,
            workers: vec![
                Arc::new(AttachPromotionWorker::new(base.clone())),
                Arc::new(DetachPromotionWorker::new(base.clone())),
            ],
            handler,
            config,
        }
    }

    /// Process one batch per queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue storage fails. Worker failures are not
    /// errors; they are counted in the summary.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<RunSummary, QueueError> {
        let mut summary = RunSummary::default();

        for worker in &self.workers {
            let items = self
                .queue
                .claim(worker.queue(), self.config.batch_size, self.config.lease)
                .await?;

            for item in items {
                match worker.process_item(&item).await {
                    Ok(()) => {
                        self.queue.complete(item.id).await?;
                        summary.processed += 1;
                    }
                    Err(err) => {
                        if self.settle_failure(&item, &err).await? {
                            summary.failed += 1;
                        } else {
                            summary.requeued += 1;
                        }
                    }
                }
            }
        }

        Ok(summary)
    }

    /// Release or fail an item whose worker returned an error. Returns
    /// whether the item was failed for good.
    async fn settle_failure(&self, item: &QueueItem, err: &WorkerError) -> Result<bool, QueueError> {
        if let WorkerError::Upstream(exception) = err {
            self.handler.report(exception);
        }

        let reason = err.to_string();
        if item.attempts >= self.config.max_attempts {
            error!(
                id = %item.id,
                queue = %item.queue,
                rule_id = %item.payload.rule_id,
                attempts = item.attempts,
                error = %reason,
                "Queue item failed permanently"
            );
            self.queue.fail(item.id, &reason).await?;
            Ok(true)
        } else {
            warn!(
                id = %item.id,
                queue = %item.queue,
                rule_id = %item.payload.rule_id,
                attempts = item.attempts,
                error = %reason,
                "Queue item failed, releasing for redelivery"
            );
            self.queue.release(item.id, &reason).await?;
            Ok(false)
        }
    }

    /// Poll the queues until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Queue runner started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = interval.tick() => match self.run_once().await {
                    Ok(summary) if summary.is_empty() => {}
                    Ok(summary) => info!(
                        processed = summary.processed,
                        requeued = summary.requeued,
                        failed = summary.failed,
                        "Queue run finished"
                    ),
                    Err(e) => error!(error = %e, "Queue run failed"),
                },
            }
        }

        info!("Queue runner stopped");
    }
}
