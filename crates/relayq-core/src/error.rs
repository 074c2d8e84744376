//! Error taxonomy for the relayq worker pipeline.
//!
//! Each concern gets its own `thiserror`-derived enum rather than one catch-all error, so that
//! callers can pattern-match on *why* something failed: a malformed message body, an unknown
//! task name, a task that raised, a full internal buffer, or a dead remote queue all need
//! different handling (see `worker::read_worker` and `worker::process_worker`).

use thiserror::Error;

/// A message body could not be parsed into a `TaskInvocation`.
///
/// Poison-pill policy: the caller is expected to log and delete the source message rather than
/// retry, since redelivery would hit the same malformed body again.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("message body did not match either supported shape (native JSON or wrapped legacy payload)")]
    UnrecognizedShape,

    #[error("legacy wrapped body field was not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("legacy pickled payload could not be decoded: {0}")]
    InvalidPickle(String),

    #[error("legacy pickled payload was not a mapping with task/args/kwargs keys")]
    MalformedLegacyPayload,

    #[error("task invocation is missing required field: {0}")]
    MissingField(&'static str),

    #[error("task name must be a non-empty string")]
    EmptyTaskName,
}

/// A task name could not be found in the `TaskRegistry`.
///
/// Distinct from [`TaskExecutionError`] because this indicates misconfiguration (an unregistered
/// task, a typo in the dotted name) rather than a data error raised by task code itself.
#[derive(Debug, Error)]
#[error("no task registered under the name '{task}'")]
pub struct ResolutionError {
    pub task: String,
}

impl ResolutionError {
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into() }
    }
}

/// A resolved task callable raised an error, or panicked, while executing.
///
/// This is a data error, not an infrastructure error: the `ProcessWorker` logs it and keeps
/// running rather than terminating the worker.
#[derive(Debug, Error)]
#[error("Task {task} raised error: with args: {args} and kwargs: {kwargs}: {backtrace}")]
pub struct TaskExecutionError {
    pub task: String,
    pub args: String,
    pub kwargs: String,
    pub backtrace: String,
}

/// The `InternalQueue` stayed full for longer than the caller was willing to wait.
///
/// Returned as a normal control-flow signal from `InternalQueue::put`, not as a fault: the
/// `ReadWorker` reacts to it by abandoning the rest of the current batch.
#[derive(Debug, Error)]
#[error("timed out after {waited_ms}ms waiting for internal queue capacity")]
pub struct BufferTimeoutError {
    pub waited_ms: u64,
}

/// The remote queue capability failed in a way that is not attributable to a single message.
///
/// `RemoteQueueError` is allowed to propagate out of `ReadWorker::run` and terminate the worker;
/// the `ManagerWorker` is responsible for respawning a replacement.
#[derive(Debug, Error)]
pub enum RemoteQueueError {
    #[error("remote queue '{queue}' receive failed: {source}")]
    Receive {
        queue: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("remote queue '{queue}' delete failed for receipt handle '{receipt_handle}': {source}")]
    Delete {
        queue: String,
        receipt_handle: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("remote queue '{queue}' is unreachable: {source}")]
    Unreachable {
        queue: String,
        #[source]
        source: anyhow::Error,
    },
}

/// The `ManagerWorker` failed to spawn or reap a child worker.
///
/// Logged and retried with backoff; fatal once `max_consecutive_failures` is exceeded (see
/// `worker::manager::ManagerWorker`).
#[derive(Debug, Error)]
pub enum SupervisionError {
    #[error("failed to spawn {role} worker #{index}: {reason}")]
    SpawnFailed {
        role: &'static str,
        index: usize,
        reason: String,
    },

    #[error("supervision gave up after {consecutive_failures} consecutive spawn failures")]
    ExhaustedRetries { consecutive_failures: u32 },
}
