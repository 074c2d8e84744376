//! The production `RemoteQueue`, backed by Amazon SQS.
//!
//! A thin wrapper around the generated `aws-sdk-sqs` client: translates broker-specific
//! request/response types at the edge and maps failures into this crate's own error enum.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::Client;

use crate::error::RemoteQueueError;

use super::capability::{RawMessage, RemoteQueue};

/// Amazon SQS-backed [`RemoteQueue`].
///
/// `visibility_timeout` is read once at construction (matching the queue attribute a producer
/// configured on the SQS side) rather than re-queried per call, since the worker does not expect
/// it to change mid-run.
#[derive(Debug, Clone)]
pub struct SqsRemoteQueue {
    client: Client,
    queue_url: String,
    name: String,
    visibility_timeout: Duration,
}

impl SqsRemoteQueue {
    pub fn new(
        client: Client,
        queue_url: impl Into<String>,
        name: impl Into<String>,
        visibility_timeout: Duration,
    ) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            name: name.into(),
            visibility_timeout,
        }
    }

    /// Build a client from the ambient AWS config (environment, profile, or instance role) and
    /// wrap it around `queue_url`.
    pub async fn connect(
        queue_url: impl Into<String>,
        name: impl Into<String>,
        visibility_timeout: Duration,
    ) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&config);
        Self::new(client, queue_url, name, visibility_timeout)
    }
}

#[async_trait]
impl RemoteQueue for SqsRemoteQueue {
    async fn receive(
        &self,
        max_messages: u32,
        wait_time: Duration,
    ) -> Result<Vec<RawMessage>, RemoteQueueError> {
        // SQS caps a single receive at 10 messages and a 20s long-poll wait.
        let capped_max = max_messages.clamp(1, 10) as i32;
        let capped_wait = wait_time.as_secs().min(20) as i32;

        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(capped_max)
            .wait_time_seconds(capped_wait)
            .send()
            .await
            .map_err(|err| RemoteQueueError::Receive {
                queue: self.name.clone(),
                source: anyhow::Error::new(err),
            })?;

        let messages = output
            .messages()
            .iter()
            .filter_map(|m| {
                let receipt_handle = m.receipt_handle()?.to_string();
                let body = m.body()?.to_string().into_bytes();
                Some(RawMessage {
                    receipt_handle,
                    body,
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), RemoteQueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|err| RemoteQueueError::Delete {
                queue: self.name.clone(),
                receipt_handle: receipt_handle.to_string(),
                source: anyhow::Error::new(err),
            })?;
        Ok(())
    }

    fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    fn name(&self) -> &str {
        &self.name
    }
}
