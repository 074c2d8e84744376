//! Bounded, concurrency-safe hand-off between [`crate::worker::read_worker::ReadWorker`] and
//! [`crate::worker::process_worker::ProcessWorker`].
//!
//! Built on a bounded `tokio::sync::mpsc` channel rather than exposed raw channel ends: the
//! channel already gives us the capacity bound and FIFO ordering this hand-off needs, and
//! wrapping it keeps the public surface to `put`/`get`/`len` instead of leaking `Sender`/
//! `Receiver` vocabulary into callers.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use crate::error::BufferTimeoutError;

/// Returned by [`InternalQueue::get`] when no item arrived before the timeout, or the queue has
/// been closed and fully drained.
#[derive(Debug, Error)]
#[error("internal queue is empty")]
pub struct EmptyError;

/// A bounded FIFO hand-off queue, shared by `Arc` among all readers and processors.
#[derive(Debug)]
pub struct InternalQueue<T> {
    capacity: usize,
    tx: mpsc::Sender<T>,
    rx: Mutex<mpsc::Receiver<T>>,
}

impl<T: Send + 'static> InternalQueue<T> {
    /// Create a new queue with the given bounded capacity.
    ///
    /// A recommended default capacity is `2 * number_of_process_workers`; this constructor
    /// takes the capacity as given and leaves that choice to the caller (`ManagerWorker::start`).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            capacity,
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Attempt to enqueue `item`, waiting up to `timeout` for free capacity.
    ///
    /// A timeout here is a normal control signal, not a fault: callers such as
    /// `ReadWorker::read_message` react to it by abandoning the rest of the current batch rather
    /// than propagating an error up the call stack.
    pub async fn put(&self, item: T, timeout: Duration) -> Result<(), BufferTimeoutError> {
        match tokio::time::timeout(timeout, self.tx.send(item)).await {
            Ok(Ok(())) => Ok(()),
            // Receiver dropped (queue shut down mid-send): treat the same as a timeout since
            // the caller's only recourse is to abandon the item and let the remote queue
            // redeliver it.
            Ok(Err(_send_error)) => Err(BufferTimeoutError {
                waited_ms: timeout.as_millis() as u64,
            }),
            Err(_elapsed) => Err(BufferTimeoutError {
                waited_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Attempt to dequeue an item, waiting up to `timeout`.
    ///
    /// Only one consumer observes a given item: concurrent `get` calls from multiple
    /// `ProcessWorker`s serialize on the internal receiver lock, which is the standard way to
    /// share a single `mpsc::Receiver` among many async tasks.
    pub async fn get(&self, timeout: Duration) -> Result<T, EmptyError> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(item)) => Ok(item),
            Ok(None) => Err(EmptyError),
            Err(_elapsed) => Err(EmptyError),
        }
    }

    /// Advisory current length, derived from the sender's available permits.
    ///
    /// Advisory only: not authoritative under concurrent access, since another task may enqueue
    /// or dequeue between the permit read and the caller observing the result.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
