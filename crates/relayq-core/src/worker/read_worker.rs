//! Stage one of the pipeline: long-polls the remote queue, decodes bodies, and hands decoded
//! invocations off to the `InternalQueue`.
//!
//! A message is deleted from the remote queue as soon as it is durably handed off to the
//! internal buffer, never after — the `ProcessWorker` never touches the remote queue at all.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::decode;
use crate::error::RemoteQueueError;
use crate::internal_queue::InternalQueue;
use crate::queue::RemoteQueue;
use crate::task_invocation::QueuedTask;

use super::base::BaseWorker;

/// Reads from the remote queue and feeds the internal hand-off queue.
pub struct ReadWorker {
    base: BaseWorker,
    remote: Arc<dyn RemoteQueue>,
    internal: Arc<InternalQueue<QueuedTask>>,
    batch_size: u32,
    long_poll_wait: Duration,
}

impl ReadWorker {
    pub fn new(
        base: BaseWorker,
        remote: Arc<dyn RemoteQueue>,
        internal: Arc<InternalQueue<QueuedTask>>,
        batch_size: u32,
        long_poll_wait: Duration,
    ) -> Self {
        Self {
            base,
            remote,
            internal,
            batch_size,
            long_poll_wait,
        }
    }

    /// Run the read loop until shutdown is requested or the parent process dies.
    ///
    /// If `should_exit()` is already true on entry, `run()` returns immediately without calling
    /// `read_message` at all.
    pub async fn run(&self) {
        while !self.base.should_exit() {
            if let Err(err) = self.read_message().await {
                warn!(error = %err, queue = self.remote.name(), "read worker stopping after remote queue error");
                break;
            }
        }
    }

    /// Fetch and hand off one batch of messages. A batch of zero messages is a normal outcome
    /// (S3) and returns `Ok(())` having done nothing.
    pub async fn read_message(&self) -> Result<(), RemoteQueueError> {
        let messages = self.remote.receive(self.batch_size, self.long_poll_wait).await?;
        if messages.is_empty() {
            debug!(queue = self.remote.name(), "no messages available");
            return Ok(());
        }

        let mut messages = messages.into_iter();
        while let Some(raw) = messages.next() {
            let fetched_at = Instant::now();
            let invocation = match decode::decode(
                &raw.body,
                fetched_at,
                self.remote.visibility_timeout(),
            ) {
                Ok(invocation) => invocation,
                Err(err) => {
                    warn!(error = %err, receipt_handle = %raw.receipt_handle, "dropping undecodable message");
                    self.remote.delete(&raw.receipt_handle).await?;
                    continue;
                }
            };

            let now = Instant::now();
            if invocation.is_expired(now) {
                warn!(
                    task = %invocation.task,
                    "Clearing Local messages since we exceeded their visibility_timeout"
                );
                continue;
            }

            let remaining = invocation.remaining_visibility(now);
            let receipt_handle = raw.receipt_handle.clone();
            let queued = QueuedTask::new(receipt_handle.clone(), invocation);
            match self.internal.put(queued, remaining).await {
                Ok(()) => {
                    // Hand-off succeeded: the invocation is now owned by the internal
                    // pipeline, so the source message must never be redelivered.
                    self.remote.delete(&receipt_handle).await?;
                }
                Err(_timeout) => {
                    warn!(
                        receipt_handle = %receipt_handle,
                        "Timed out trying to add the following message to the internal queue"
                    );
                    // The remote queue's visibility window has lapsed for this message while we
                    // waited, so it - and everything still unprocessed in this batch - is now
                    // released: drop all of it from local memory without deleting, and let the
                    // remote queue redeliver each one once its own visibility timeout lapses.
                    warn!(
                        receipt_handle = %receipt_handle,
                        "Clearing Local messages since we exceeded their visibility_timeout"
                    );
                    for abandoned in messages {
                        warn!(
                            receipt_handle = %abandoned.receipt_handle,
                            "Clearing Local messages since we exceeded their visibility_timeout"
                        );
                    }
                    break;
                }
            }
        }

        Ok(())
    }
}
