//! Spawns and supervises the reader and processor worker pools, and coordinates shutdown.
//!
//! Each worker role runs as its own `tokio::task`, the manager holds their `JoinHandle`s, and a
//! respawn loop replaces any that exit unexpectedly while the manager is not itself shutting
//! down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::SupervisionError;
use crate::internal_queue::InternalQueue;
use crate::queue::RemoteQueue;
use crate::resolver::TaskRegistry;
use crate::task_invocation::QueuedTask;

use super::base::BaseWorker;
use super::process_worker::ProcessWorker;
use super::read_worker::ReadWorker;

/// Tunables for the worker pool, distinct from [`crate::config::WorkerSettings`] in that these
/// are already-resolved `Duration`/count values rather than raw config input.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub read_worker_count: usize,
    pub process_worker_count: usize,
    pub internal_queue_capacity: usize,
    pub batch_size: u32,
    pub long_poll_wait: Duration,
    pub process_poll_timeout: Duration,
    /// How long `shutdown` waits for in-flight work to drain before forcibly aborting workers.
    pub drain_deadline: Duration,
    /// Consecutive spawn failures for a single role before supervision gives up entirely.
    pub max_consecutive_spawn_failures: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            read_worker_count: 1,
            process_worker_count: 2,
            internal_queue_capacity: 4,
            batch_size: 10,
            long_poll_wait: Duration::from_secs(20),
            process_poll_timeout: Duration::from_secs(1),
            drain_deadline: Duration::from_secs(10),
            max_consecutive_spawn_failures: 5,
        }
    }
}

/// Owns the worker pool's lifecycle: spawning, respawn-on-crash supervision, and graceful
/// shutdown.
pub struct ManagerWorker {
    config: ManagerConfig,
    remote: Arc<dyn RemoteQueue>,
    registry: Arc<TaskRegistry>,
    internal: Arc<InternalQueue<QueuedTask>>,
    shutdown: Arc<AtomicBool>,
    read_handles: Vec<JoinHandle<()>>,
    process_handles: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for ManagerWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerWorker")
            .field("config", &self.config)
            .field("queue", &self.remote.name())
            .field("readers", &self.read_handles.len())
            .field("processors", &self.process_handles.len())
            .finish()
    }
}

impl ManagerWorker {
    pub fn new(config: ManagerConfig, remote: Arc<dyn RemoteQueue>, registry: Arc<TaskRegistry>) -> Self {
        let internal = Arc::new(InternalQueue::new(config.internal_queue_capacity));
        Self {
            config,
            remote,
            registry,
            internal,
            shutdown: Arc::new(AtomicBool::new(false)),
            read_handles: Vec::new(),
            process_handles: Vec::new(),
        }
    }

    fn spawn_read_worker(&self) -> JoinHandle<()> {
        let base = BaseWorker::new(self.shutdown.clone());
        let worker = ReadWorker::new(
            base,
            self.remote.clone(),
            self.internal.clone(),
            self.config.batch_size,
            self.config.long_poll_wait,
        );
        tokio::spawn(async move { worker.run().await })
    }

    fn spawn_process_worker(&self) -> JoinHandle<()> {
        let base = BaseWorker::new(self.shutdown.clone());
        let worker = ProcessWorker::new(
            base,
            self.internal.clone(),
            self.registry.clone(),
            self.config.process_poll_timeout,
        );
        tokio::spawn(async move { worker.run().await })
    }

    /// Spawn the configured number of readers and processors.
    pub fn start(&mut self) {
        for _ in 0..self.config.read_worker_count {
            self.read_handles.push(self.spawn_read_worker());
        }
        for _ in 0..self.config.process_worker_count {
            self.process_handles.push(self.spawn_process_worker());
        }
        info!(
            readers = self.config.read_worker_count,
            processors = self.config.process_worker_count,
            "worker pool started"
        );
    }

    /// Supervise the pool: block until shutdown is requested, respawning any worker that exits
    /// unexpectedly in the meantime.
    pub async fn supervise(&mut self) -> Result<(), SupervisionError> {
        let mut consecutive_failures: u32 = 0;

        while !self.shutdown.load(Ordering::SeqCst) {
            self.reap_and_respawn_readers(&mut consecutive_failures)?;
            self.reap_and_respawn_processors(&mut consecutive_failures)?;
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        Ok(())
    }

    fn reap_and_respawn_readers(&mut self, consecutive_failures: &mut u32) -> Result<(), SupervisionError> {
        for i in 0..self.read_handles.len() {
            if self.read_handles[i].is_finished() {
                warn!(role = "reader", index = i, "worker exited unexpectedly, respawning");
                *consecutive_failures += 1;
                if *consecutive_failures > self.config.max_consecutive_spawn_failures {
                    return Err(SupervisionError::ExhaustedRetries {
                        consecutive_failures: *consecutive_failures,
                    });
                }
                self.read_handles[i] = self.spawn_read_worker();
            } else {
                *consecutive_failures = 0;
            }
        }
        Ok(())
    }

    fn reap_and_respawn_processors(&mut self, consecutive_failures: &mut u32) -> Result<(), SupervisionError> {
        for i in 0..self.process_handles.len() {
            if self.process_handles[i].is_finished() {
                warn!(role = "processor", index = i, "worker exited unexpectedly, respawning");
                *consecutive_failures += 1;
                if *consecutive_failures > self.config.max_consecutive_spawn_failures {
                    return Err(SupervisionError::ExhaustedRetries {
                        consecutive_failures: *consecutive_failures,
                    });
                }
                self.process_handles[i] = self.spawn_process_worker();
            } else {
                *consecutive_failures = 0;
            }
        }
        Ok(())
    }

    /// Request shutdown, wait up to `drain_deadline` for in-flight work to finish cooperatively,
    /// then forcibly abort anything still running.
    pub async fn shutdown(&mut self) {
        info!("shutdown requested, signaling workers");
        self.shutdown.store(true, Ordering::SeqCst);

        let all_handles: Vec<&mut JoinHandle<()>> = self
            .read_handles
            .iter_mut()
            .chain(self.process_handles.iter_mut())
            .collect();

        let drain = async {
            for handle in all_handles {
                let _ = handle.await;
            }
        };

        if tokio::time::timeout(self.config.drain_deadline, drain).await.is_err() {
            warn!("drain deadline exceeded, aborting remaining workers");
            for handle in self.read_handles.iter().chain(self.process_handles.iter()) {
                handle.abort();
            }
        } else {
            info!("all workers drained cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryRemoteQueue;

    #[tokio::test]
    async fn start_spawns_configured_worker_counts() {
        let remote = Arc::new(InMemoryRemoteQueue::new("q", Duration::from_secs(30)));
        let registry = Arc::new(TaskRegistry::new());
        let config = ManagerConfig {
            read_worker_count: 2,
            process_worker_count: 3,
            long_poll_wait: Duration::from_millis(20),
            ..ManagerConfig::default()
        };
        let mut manager = ManagerWorker::new(config, remote, registry);
        manager.start();
        assert_eq!(manager.read_handles.len(), 2);
        assert_eq!(manager.process_handles.len(), 3);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_workers_and_sets_flag() {
        let remote = Arc::new(InMemoryRemoteQueue::new("q", Duration::from_secs(30)));
        let registry = Arc::new(TaskRegistry::new());
        let config = ManagerConfig {
            read_worker_count: 1,
            process_worker_count: 1,
            long_poll_wait: Duration::from_millis(20),
            drain_deadline: Duration::from_secs(2),
            ..ManagerConfig::default()
        };
        let mut manager = ManagerWorker::new(config, remote, registry);
        manager.start();
        manager.shutdown().await;
        assert!(manager.shutdown.load(Ordering::SeqCst));
        for handle in manager.read_handles.iter().chain(manager.process_handles.iter()) {
            assert!(handle.is_finished());
        }
    }
}
