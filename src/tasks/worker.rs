use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{
    task::JoinHandle,
    time::{sleep, timeout},
};

use crate::{
    config::QueueConfig,
    domain::{BatchOutcome, QueuedMessage},
    infrastructure::shutdown::ShutdownListener,
    tasks::{processor::MessageProcessor, queue::SpoolQueue},
};

/// How one invocation over a batch ended, from the queue's point of view.
#[derive(Debug)]
pub enum Invocation {
    Completed(BatchOutcome),
    PublishFailed,
    TimedOut,
}

/// Polls the spool queue and hands each batch to the processor, acknowledging
/// or releasing messages based on how the invocation ended.
pub struct QueueWorker {
    queue: Arc<SpoolQueue>,
    processor: Arc<MessageProcessor>,
    batch_size: usize,
    poll_interval: Duration,
    invocation_timeout: Duration,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<SpoolQueue>,
        processor: Arc<MessageProcessor>,
        config: &QueueConfig,
    ) -> Self {
        Self {
            queue,
            processor,
            batch_size: config.batch_size,
            poll_interval: config.poll_interval,
            invocation_timeout: config.invocation_timeout,
        }
    }

    pub fn spawn(self: Arc<Self>, mut shutdown: ShutdownListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(err) = self.run_loop(&mut shutdown).await {
                tracing::error!(target: "worker", error = %err, "queue worker crashed");
            }
        })
    }

    async fn run_loop(&self, shutdown: &mut ShutdownListener) -> Result<()> {
        loop {
            if shutdown.is_triggered() {
                break;
            }

            let batch = match self.queue.receive(self.batch_size) {
                Ok(batch) => batch,
                Err(err) => {
                    tracing::error!(target: "worker", error = %err, "failed to receive batch");
                    Vec::new()
                }
            };
            if batch.is_empty() {
                tokio::select! {
                    _ = sleep(self.poll_interval) => {}
                    _ = shutdown.notified() => break,
                }
                continue;
            }

            let invocation = self.invoke(&batch).await;
            if let Err(err) = self.settle(&batch, &invocation) {
                tracing::error!(target: "worker", error = %err, "failed to settle batch");
            }
        }
        tracing::info!(target: "worker", "queue worker stopped");
        Ok(())
    }

    /// Runs the processor under the invocation timeout. Shutdown does not cut an
    /// invocation short; the timeout bounds how long it can take.
    pub async fn invoke(&self, batch: &[QueuedMessage]) -> Invocation {
        match timeout(self.invocation_timeout, self.processor.process(batch)).await {
            Ok(Ok(outcome)) => {
                tracing::debug!(
                    target: "worker",
                    response = %outcome.to_response_json(),
                    "invocation completed"
                );
                Invocation::Completed(outcome)
            }
            Ok(Err(err)) => {
                tracing::error!(
                    target: "worker",
                    error = %err,
                    total = batch.len(),
                    "event publish failed; releasing whole batch"
                );
                Invocation::PublishFailed
            }
            Err(_) => {
                tracing::error!(
                    target: "worker",
                    timeout = ?self.invocation_timeout,
                    total = batch.len(),
                    "invocation timed out; releasing whole batch"
                );
                Invocation::TimedOut
            }
        }
    }

    /// Releases failed identifiers and acknowledges the rest; a failed
    /// invocation releases everything.
    pub fn settle(&self, batch: &[QueuedMessage], invocation: &Invocation) -> Result<()> {
        let mut first_error = None;
        for message in batch {
            let redeliver = match invocation {
                Invocation::Completed(outcome) => outcome.is_failed(&message.identifier),
                Invocation::PublishFailed | Invocation::TimedOut => true,
            };
            let result = if redeliver {
                self.queue.release(&message.identifier)
            } else {
                self.queue.ack(&message.identifier)
            };
            if let Err(err) = result {
                tracing::warn!(
                    target: "worker",
                    identifier = %message.identifier,
                    error = %err,
                    "failed to settle message"
                );
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
