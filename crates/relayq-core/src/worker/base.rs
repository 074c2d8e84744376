//! Shared shutdown and parent-liveness plumbing used by every worker role.
//!
//! A worker checks two independent conditions before doing any work — has it been asked to stop,
//! and has its parent process died, leaving it orphaned (reparented to pid 1 on Linux). Either
//! one means `run()` should return without touching the queue at all. `should_exit()` takes an
//! injectable liveness check rather than calling `libc::getppid()` directly, so it stays testable
//! without forking a real orphan process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

fn real_parent_is_alive() -> bool {
    // SAFETY: `getppid` takes no arguments and can never fail; it is always safe to call.
    let ppid = unsafe { libc::getppid() };
    ppid != 1
}

/// Shared exit conditions consulted by `ReadWorker::run` and `ProcessWorker::run` on every
/// iteration.
#[derive(Clone)]
pub struct BaseWorker {
    /// Per-instance identifier attached to this worker's log lines, so respawned workers of the
    /// same role are distinguishable in aggregated logs.
    id: Uuid,
    shutdown: Arc<AtomicBool>,
    parent_alive_check: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl std::fmt::Debug for BaseWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseWorker")
            .field("id", &self.id)
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

impl BaseWorker {
    /// Build a worker using the real `getppid(2)`-backed liveness check.
    pub fn new(shutdown: Arc<AtomicBool>) -> Self {
        Self {
            id: Uuid::now_v7(),
            shutdown,
            parent_alive_check: Arc::new(real_parent_is_alive),
        }
    }

    /// Build a worker with a substitute liveness check, for tests that need to simulate an
    /// orphaned parent without actually forking and killing a process.
    pub fn with_parent_check(
        shutdown: Arc<AtomicBool>,
        parent_alive_check: Arc<dyn Fn() -> bool + Send + Sync>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            shutdown,
            parent_alive_check,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// True once the manager has asked every worker to stop.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// True if this process's parent is still alive.
    ///
    /// A worker spawned as a detached child whose parent has exited gets reparented to the
    /// system's reaper (pid 1 under Linux); treating that as equivalent to an explicit shutdown
    /// request prevents orphaned workers from running forever.
    pub fn parent_is_alive(&self) -> bool {
        (self.parent_alive_check)()
    }

    /// True if the worker should stop its run loop: either shutdown was requested, or the
    /// parent process is gone.
    pub fn should_exit(&self) -> bool {
        self.is_shutting_down() || !self.parent_is_alive()
    }
}
