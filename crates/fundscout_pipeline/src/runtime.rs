//! Stage runtime: one consume loop per (stage, partition).
//!
//! Commit-after-process gives at-least-once delivery; the stage-wide
//! semaphore caps concurrent message processing without breaking
//! per-partition ordering. Shutdown drains the in-flight message: the
//! select only interrupts the wait for the next record, never the handler.

use async_trait::async_trait;
use fundscout_protocol::PipelineStage;
use fundscout_stream::{StreamRecord, Subscription};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info};

#[async_trait]
pub trait StageWorker: Send + Sync {
    fn stage(&self) -> PipelineStage;

    /// Process one record. Failures are the worker's business: they turn
    /// into workflow-error events, never into a poisoned loop.
    async fn handle(&self, record: StreamRecord);
}

pub(crate) async fn run_partition(
    worker: Arc<dyn StageWorker>,
    mut subscription: Subscription,
    mut shutdown: watch::Receiver<bool>,
    permits: Arc<Semaphore>,
) {
    let stage = worker.stage();
    let partition = subscription.partition();
    debug!(%stage, partition, "stage consumer started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            record = subscription.next() => {
                let offset = record.offset;
                // Closed semaphore means shutdown; drop out.
                let Ok(_permit) = permits.acquire().await else {
                    break;
                };
                worker.handle(record).await;
                subscription.commit(offset).await;
            }
        }
    }

    info!(%stage, partition, "stage consumer stopped");
}
