//! Maps a decoded task's dotted name to the callable that runs it.
//!
//! There is no dynamic module import here (no Rust analog of Python's `importlib`): tasks are
//! registered ahead of time, by dotted name, into a [`TaskRegistry`] the process builds at
//! startup. Looking a name up that was never registered is a configuration error, not a data
//! error, and is reported via [`ResolutionError`] rather than [`crate::error::TaskExecutionError`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ResolutionError;

/// The result a task callable returns: `Ok(())` on success, `Err` with a human-readable message
/// on failure. The message becomes the `backtrace` field of a
/// [`crate::error::TaskExecutionError`].
pub type TaskResult = Result<(), String>;

/// A registered unit of work, invoked with the `args`/`kwargs` decoded from a message.
///
/// Implemented as an `async_trait` object rather than a plain `fn` pointer so tasks can hold
/// state (a database pool, an HTTP client) captured at registration time.
#[async_trait]
pub trait Task: Send + Sync {
    async fn call(&self, args: &[Value], kwargs: &Map<String, Value>) -> TaskResult;
}

/// Adapts a plain async closure into a [`Task`], for tests and simple registrations that don't
/// need to carry their own state.
pub struct FnTask<F> {
    f: F,
}

impl<F> FnTask<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

type BoxedTaskFuture = Pin<Box<dyn Future<Output = TaskResult> + Send>>;

#[async_trait]
impl<F> Task for FnTask<F>
where
    F: Fn(&[Value], &Map<String, Value>) -> BoxedTaskFuture + Send + Sync,
{
    async fn call(&self, args: &[Value], kwargs: &Map<String, Value>) -> TaskResult {
        (self.f)(args, kwargs).await
    }
}

/// The set of tasks a worker process knows how to run, keyed by dotted name
/// (e.g. `"tests.tasks.index_incrementer"`).
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<dyn Task>>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("registered", &self.tasks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` under `name`, replacing any previous registration for that name.
    pub fn register(&mut self, name: impl Into<String>, task: Arc<dyn Task>) {
        self.tasks.insert(name.into(), task);
    }

    /// Look up a task by dotted name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Task>, ResolutionError> {
        self.tasks
            .get(name)
            .cloned()
            .ok_or_else(|| ResolutionError::new(name))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTask {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Task for CountingTask {
        async fn call(&self, _args: &[Value], _kwargs: &Map<String, Value>) -> TaskResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn resolves_registered_task_by_name() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new();
        registry.register(
            "tests.tasks.index_incrementer",
            Arc::new(CountingTask {
                calls: calls.clone(),
            }),
        );

        let task = registry
            .resolve("tests.tasks.index_incrementer")
            .expect("should resolve");
        task.call(&[], &Map::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregistered_name_is_a_resolution_error() {
        let registry = TaskRegistry::new();
        let err = registry.resolve("tests.tasks.missing").unwrap_err();
        assert_eq!(err.task, "tests.tasks.missing");
    }

    #[tokio::test]
    async fn task_failure_surfaces_as_err_string() {
        struct FailingTask;
        #[async_trait]
        impl Task for FailingTask {
            async fn call(&self, _args: &[Value], _kwargs: &Map<String, Value>) -> TaskResult {
                Err("boom".to_string())
            }
        }

        let mut registry = TaskRegistry::new();
        registry.register("tests.tasks.failing", Arc::new(FailingTask));
        let task = registry.resolve("tests.tasks.failing").unwrap();
        let err = task.call(&[], &Map::new()).await.unwrap_err();
        assert_eq!(err, "boom");
    }
}
