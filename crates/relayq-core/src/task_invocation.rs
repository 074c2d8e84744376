//! The normalized, in-memory form of a decoded task message.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};

/// A decoded task invocation, owned by exactly one worker at a time.
///
/// Created by [`crate::worker::read_worker::ReadWorker`] on receipt, handed off through the
/// [`crate::internal_queue::InternalQueue`], and consumed by
/// [`crate::worker::process_worker::ProcessWorker`]. `fetched_at`/`visibility_deadline` use
/// [`Instant`] rather than wall-clock time so deadline math is immune to clock adjustments.
#[derive(Debug, Clone)]
pub struct TaskInvocation {
    pub task: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    pub fetched_at: Instant,
    pub visibility_deadline: Instant,
}

impl TaskInvocation {
    pub fn new(
        task: String,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        fetched_at: Instant,
        visibility_timeout: Duration,
    ) -> Self {
        Self {
            task,
            args,
            kwargs,
            fetched_at,
            visibility_deadline: fetched_at + visibility_timeout,
        }
    }

    /// Time remaining before the source message's visibility window expires.
    ///
    /// Returns `Duration::ZERO` once the deadline has already passed, rather than panicking
    /// (`Instant` subtraction saturates via [`Instant::saturating_duration_since`]).
    pub fn remaining_visibility(&self, now: Instant) -> Duration {
        self.visibility_deadline.saturating_duration_since(now)
    }

    /// True once `now` is at or past the visibility deadline.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.visibility_deadline
    }

    /// Renders `args` the way the original log messages expect: `[1, "two"]`.
    pub fn args_display(&self) -> String {
        Value::Array(self.args.clone()).to_string()
    }

    /// Renders `kwargs` the way the original log messages expect: `{"message": "hi"}`.
    pub fn kwargs_display(&self) -> String {
        Value::Object(self.kwargs.clone()).to_string()
    }
}

/// A [`TaskInvocation`] paired with the receipt handle of its source message.
///
/// The decoder stays pure and knows nothing about the remote queue. The `ReadWorker` attaches the
/// receipt handle when it hands a decoded invocation to the `InternalQueue`, but by that point the
/// source message has already been deleted - the handle travels along only for log correlation;
/// the `ProcessWorker` never touches the remote queue.
#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub receipt_handle: String,
    pub invocation: TaskInvocation,
}

impl QueuedTask {
    pub fn new(receipt_handle: impl Into<String>, invocation: TaskInvocation) -> Self {
        Self {
            receipt_handle: receipt_handle.into(),
            invocation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_visibility_saturates_at_zero() {
        let fetched_at = Instant::now();
        let inv = TaskInvocation::new(
            "tests.tasks.noop".into(),
            vec![],
            Map::new(),
            fetched_at,
            Duration::from_millis(1),
        );
        let later = fetched_at + Duration::from_secs(5);
        assert_eq!(inv.remaining_visibility(later), Duration::ZERO);
        assert!(inv.is_expired(later));
    }

    #[test]
    fn not_expired_before_deadline() {
        let fetched_at = Instant::now();
        let inv = TaskInvocation::new(
            "tests.tasks.noop".into(),
            vec![],
            Map::new(),
            fetched_at,
            Duration::from_secs(30),
        );
        assert!(!inv.is_expired(fetched_at));
        assert!(inv.remaining_visibility(fetched_at) > Duration::from_secs(29));
    }
}
