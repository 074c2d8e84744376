//! Stage two of the pipeline: dequeues a decoded invocation, resolves it to a registered task,
//! runs it, and reports the outcome.
//!
//! Each invocation runs inside its own `tokio::spawn`, so a panicking task surfaces as a
//! `JoinError` rather than unwinding into `ProcessWorker::run` and taking the whole worker down
//! with it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::error::TaskExecutionError;
use crate::internal_queue::EmptyError;
use crate::internal_queue::InternalQueue;
use crate::resolver::TaskRegistry;
use crate::task_invocation::QueuedTask;

use super::base::BaseWorker;

/// Dequeues from the internal queue and executes tasks.
///
/// Never touches the remote queue: the source message was already deleted by the `ReadWorker`
/// at hand-off time, so there is nothing left for this worker to acknowledge.
pub struct ProcessWorker {
    base: BaseWorker,
    internal: Arc<InternalQueue<QueuedTask>>,
    registry: Arc<TaskRegistry>,
    poll_timeout: Duration,
}

impl ProcessWorker {
    pub fn new(
        base: BaseWorker,
        internal: Arc<InternalQueue<QueuedTask>>,
        registry: Arc<TaskRegistry>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            base,
            internal,
            registry,
            poll_timeout,
        }
    }

    /// Run the process loop until shutdown is requested or the parent process dies.
    pub async fn run(&self) {
        while !self.base.should_exit() {
            self.process_message().await;
        }
    }

    /// Dequeue and run a single invocation. An empty internal queue (S4) is a normal outcome and
    /// this returns having done nothing.
    pub async fn process_message(&self) {
        let queued = match self.internal.get(self.poll_timeout).await {
            Ok(queued) => queued,
            Err(EmptyError) => return,
        };

        // The receipt handle travels with the invocation only for log correlation; the source
        // message was already deleted by the ReadWorker before this worker ever saw it.
        let QueuedTask { invocation, .. } = queued;

        let task = match self.registry.resolve(&invocation.task) {
            Ok(task) => task,
            Err(err) => {
                error!(task = %invocation.task, error = %err, "no task registered for this name, dropping message");
                return;
            }
        };

        let args = invocation.args.clone();
        let kwargs = invocation.kwargs.clone();
        let task_name = invocation.task.clone();

        let outcome = tokio::spawn(async move { task.call(&args, &kwargs).await }).await;

        match outcome {
            Ok(Ok(())) => {
                info!(
                    task = %task_name,
                    "Processed task {} with args: {} and kwargs: {}",
                    task_name,
                    invocation.args_display(),
                    invocation.kwargs_display()
                );
            }
            Ok(Err(message)) => {
                let err = TaskExecutionError {
                    task: task_name.clone(),
                    args: invocation.args_display(),
                    kwargs: invocation.kwargs_display(),
                    backtrace: message,
                };
                error!(task = %task_name, "{err}");
            }
            Err(join_err) => {
                let backtrace = if join_err.is_panic() {
                    let panic = join_err.into_panic();
                    if let Some(s) = panic.downcast_ref::<&str>() {
                        format!("task panicked: {s}")
                    } else if let Some(s) = panic.downcast_ref::<String>() {
                        format!("task panicked: {s}")
                    } else {
                        "task panicked with a non-string payload".to_string()
                    }
                } else {
                    join_err.to_string()
                };
                let err = TaskExecutionError {
                    task: task_name.clone(),
                    args: invocation.args_display(),
                    kwargs: invocation.kwargs_display(),
                    backtrace,
                };
                error!(task = %task_name, "{err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Task;
    use crate::task_invocation::TaskInvocation;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;
    use tracing_subscriber::fmt::MakeWriter;

    fn base(shutdown: bool) -> BaseWorker {
        BaseWorker::new(Arc::new(AtomicBool::new(shutdown)))
    }

    /// A `tracing` writer that appends every log line to a shared buffer, mirroring the capture
    /// harness `tests/integration_scenarios.rs` uses to assert on log substrings.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contains(&self, needle: &str) -> bool {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).contains(needle)
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn install_log_capture() -> (CapturedLogs, tracing::dispatcher::DefaultGuard) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
        (logs, guard)
    }

    async fn seed_invocation(internal: &InternalQueue<QueuedTask>, task: &str) {
        let invocation = TaskInvocation::new(
            task.to_string(),
            vec![],
            Map::new(),
            Instant::now(),
            Duration::from_secs(30),
        );
        internal
            .put(
                QueuedTask::new("receipt-1", invocation),
                Duration::from_millis(50),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn process_message_is_a_noop_on_empty_internal_queue() {
        let internal = Arc::new(InternalQueue::new(4));
        let registry = Arc::new(TaskRegistry::new());
        let worker = ProcessWorker::new(base(false), internal, registry, Duration::from_millis(20));
        worker.process_message().await;
    }

    #[tokio::test]
    async fn process_message_runs_registered_task() {
        struct CountingTask(Arc<AtomicUsize>);
        #[async_trait]
        impl Task for CountingTask {
            async fn call(&self, _args: &[Value], _kwargs: &Map<String, Value>) -> Result<(), String> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let internal = Arc::new(InternalQueue::new(4));
        seed_invocation(&internal, "tests.tasks.index_incrementer").await;

        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new();
        registry.register("tests.tasks.index_incrementer", Arc::new(CountingTask(calls.clone())));

        let worker = ProcessWorker::new(base(false), internal, Arc::new(registry), Duration::from_millis(50));
        worker.process_message().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn process_message_contains_task_error_without_terminating() {
        let internal = Arc::new(InternalQueue::new(4));
        seed_invocation(&internal, "tests.tasks.failing").await;

        struct FailingTask;
        #[async_trait]
        impl Task for FailingTask {
            async fn call(&self, _args: &[Value], _kwargs: &Map<String, Value>) -> Result<(), String> {
                Err("boom".to_string())
            }
        }

        let mut registry = TaskRegistry::new();
        registry.register("tests.tasks.failing", Arc::new(FailingTask));

        let worker = ProcessWorker::new(base(false), internal, Arc::new(registry), Duration::from_millis(50));
        // Must not panic or terminate the worker; the error is only logged.
        worker.process_message().await;
    }

    #[tokio::test]
    async fn process_message_captures_real_panic_payload_without_terminating() {
        let internal = Arc::new(InternalQueue::new(4));
        seed_invocation(&internal, "tests.tasks.panicking").await;

        struct PanickingTask;
        #[async_trait]
        impl Task for PanickingTask {
            async fn call(&self, _args: &[Value], _kwargs: &Map<String, Value>) -> Result<(), String> {
                panic!("Need to be given basestring, was given 23");
            }
        }

        let mut registry = TaskRegistry::new();
        registry.register("tests.tasks.panicking", Arc::new(PanickingTask));

        let worker = ProcessWorker::new(base(false), internal, Arc::new(registry), Duration::from_millis(50));

        let (logs, guard) = install_log_capture();
        // Must not panic or terminate the worker; the panic is caught at the tokio::spawn
        // boundary and logged with its real payload, not a generic placeholder.
        worker.process_message().await;
        drop(guard);

        assert!(logs.contains("raised error"));
        assert!(logs.contains("Need to be given basestring, was given 23"));
    }

    #[tokio::test]
    async fn process_message_drops_message_for_unresolvable_task() {
        let internal = Arc::new(InternalQueue::new(4));
        seed_invocation(&internal, "tests.tasks.nonexistent").await;

        let registry = Arc::new(TaskRegistry::new());
        let worker = ProcessWorker::new(base(false), internal, registry, Duration::from_millis(50));
        // Must not panic; an unresolvable task is logged and dropped.
        worker.process_message().await;
    }

    #[tokio::test]
    async fn run_returns_immediately_when_already_shutting_down() {
        let internal = Arc::new(InternalQueue::new(4));
        seed_invocation(&internal, "tests.tasks.never_called").await;
        let registry = Arc::new(TaskRegistry::new());
        let worker = ProcessWorker::new(base(true), internal.clone(), registry, Duration::from_millis(20));
        worker.run().await;
        assert_eq!(internal.len(), 1);
    }
}
