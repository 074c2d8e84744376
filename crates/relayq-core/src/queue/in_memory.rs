//! An in-process `RemoteQueue` test double, used to exercise worker logic without a real broker.
//!
//! A `tokio::sync::Mutex<VecDeque<_>>` stands in for the broker-side queue, and "in-flight"
//! deliveries are tracked separately so `delete` only succeeds for a receipt handle that is
//! actually outstanding, the same contract a real SQS queue enforces.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::error::RemoteQueueError;

use super::capability::{RawMessage, RemoteQueue};

/// An in-memory stand-in for a broker queue, used by unit and integration tests.
///
/// Messages pushed via [`InMemoryRemoteQueue::seed`] are handed out in FIFO order by
/// [`RemoteQueue::receive`]. `delete` removes the matching in-flight entry; there is no automatic
/// re-delivery on visibility timeout expiry (tests that need that simulate it explicitly by
/// calling [`InMemoryRemoteQueue::seed`] again).
#[derive(Debug)]
pub struct InMemoryRemoteQueue {
    name: String,
    visibility_timeout: Duration,
    pending: Mutex<VecDeque<Vec<u8>>>,
    in_flight: Mutex<HashMap<String, Vec<u8>>>,
    next_receipt: AtomicU64,
}

impl InMemoryRemoteQueue {
    pub fn new(name: impl Into<String>, visibility_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            visibility_timeout,
            pending: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(HashMap::new()),
            next_receipt: AtomicU64::new(1),
        }
    }

    /// Push a raw body onto the back of the queue, as if a producer had sent it.
    pub async fn seed(&self, body: impl Into<Vec<u8>>) {
        self.pending.lock().await.push_back(body.into());
    }

    /// Number of messages not yet received (does not include in-flight deliveries).
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Number of messages received but neither deleted nor expired back.
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    fn allocate_receipt(&self) -> String {
        let id = self.next_receipt.fetch_add(1, Ordering::SeqCst);
        format!("receipt-{id}")
    }
}

#[async_trait]
impl RemoteQueue for InMemoryRemoteQueue {
    async fn receive(
        &self,
        max_messages: u32,
        wait_time: Duration,
    ) -> Result<Vec<RawMessage>, RemoteQueueError> {
        // Poll briefly instead of blocking forever: real long-polling is a broker-side
        // concern the SQS implementation handles, this double just needs to honor "wait up
        // to wait_time, then return whatever (possibly nothing) is available".
        let deadline = tokio::time::Instant::now() + wait_time;
        loop {
            let mut pending = self.pending.lock().await;
            if !pending.is_empty() {
                let mut out = Vec::new();
                while out.len() < max_messages as usize {
                    match pending.pop_front() {
                        Some(body) => {
                            let receipt_handle = self.allocate_receipt();
                            self.in_flight
                                .lock()
                                .await
                                .insert(receipt_handle.clone(), body.clone());
                            out.push(RawMessage {
                                receipt_handle,
                                body,
                            });
                        }
                        None => break,
                    }
                }
                return Ok(out);
            }
            drop(pending);

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }
            // Wake periodically rather than sleeping the full remainder, so a seed() that
            // lands mid-wait is picked up promptly instead of only at the deadline.
            let _ = timeout(remaining.min(Duration::from_millis(10)), std::future::pending::<()>())
                .await;
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), RemoteQueueError> {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.remove(receipt_handle).is_some() {
            Ok(())
        } else {
            Err(RemoteQueueError::Delete {
                queue: self.name.clone(),
                receipt_handle: receipt_handle.to_string(),
                source: anyhow::anyhow!("no such in-flight receipt handle"),
            })
        }
    }

    fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receive_returns_empty_when_nothing_seeded() {
        let q = InMemoryRemoteQueue::new("test", Duration::from_secs(30));
        let messages = q.receive(10, Duration::from_millis(20)).await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn receive_respects_max_messages() {
        let q = InMemoryRemoteQueue::new("test", Duration::from_secs(30));
        for i in 0..5 {
            q.seed(format!("body-{i}").into_bytes()).await;
        }
        let messages = q.receive(3, Duration::from_millis(20)).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(q.pending_count().await, 2);
        assert_eq!(q.in_flight_count().await, 3);
    }

    #[tokio::test]
    async fn delete_clears_in_flight_entry() {
        let q = InMemoryRemoteQueue::new("test", Duration::from_secs(30));
        q.seed(b"hello".to_vec()).await;
        let messages = q.receive(1, Duration::from_millis(20)).await.unwrap();
        let handle = &messages[0].receipt_handle;
        q.delete(handle).await.unwrap();
        assert_eq!(q.in_flight_count().await, 0);
    }

    #[tokio::test]
    async fn delete_unknown_receipt_is_an_error() {
        let q = InMemoryRemoteQueue::new("test", Duration::from_secs(30));
        let err = q.delete("not-a-real-receipt").await.unwrap_err();
        assert!(matches!(err, RemoteQueueError::Delete { .. }));
    }
}
