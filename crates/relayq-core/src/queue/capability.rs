//! The `RemoteQueue` capability: the one seam between this crate and a concrete message broker.
//!
//! Draws a line between "how a worker talks to a queue" (this trait) and "which broker is on the
//! other end" (the impls: [`super::sqs::SqsRemoteQueue`] and [`super::in_memory::InMemoryRemoteQueue`]).

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RemoteQueueError;

/// A single message as received from the remote queue, not yet decoded.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Opaque token the broker needs to delete or re-hide this specific delivery.
    pub receipt_handle: String,
    /// The undecoded message body.
    pub body: Vec<u8>,
}

/// The visibility-timeout-aware remote queue capability a `ReadWorker` depends on.
///
/// Implementations own the specifics of long-polling, batching, and visibility timeout
/// configuration for their broker; callers only see a batch of [`RawMessage`]s and a way to
/// acknowledge or abandon each one.
#[async_trait]
pub trait RemoteQueue: Send + Sync {
    /// Long-poll for up to `max_messages` messages, waiting up to `wait_time` if the queue is
    /// empty. An empty `Vec` is a normal, non-error outcome.
    async fn receive(
        &self,
        max_messages: u32,
        wait_time: Duration,
    ) -> Result<Vec<RawMessage>, RemoteQueueError>;

    /// Permanently remove a message the worker has finished with (either processed successfully,
    /// or identified as a poison pill that must not be redelivered).
    async fn delete(&self, receipt_handle: &str) -> Result<(), RemoteQueueError>;

    /// The visibility timeout this queue was configured with, used to compute how long a
    /// received message may sit in the `InternalQueue` before its receipt becomes invalid.
    fn visibility_timeout(&self) -> Duration;

    /// A short, human-readable identifier for this queue, used only in logs and errors.
    fn name(&self) -> &str;
}
