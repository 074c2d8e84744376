//! Typed configuration for the worker pool, layered from defaults, an optional file, and
//! environment variables.
//!
//! Layering order: environment variables override a base file, which overrides code defaults.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::worker::ManagerConfig;

/// Raw, deserializable settings. Durations are expressed in seconds on the wire since
/// environment variables and TOML scalars don't have a native duration type.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// SQS queue URL (or, in tests, a logical name for the in-memory double).
    pub queue_url: String,
    /// Human-readable queue identifier used only in logs.
    pub queue_name: String,
    pub read_worker_count: usize,
    pub process_worker_count: usize,
    pub internal_queue_capacity: usize,
    pub batch_size: u32,
    pub long_poll_wait_secs: u64,
    pub process_poll_timeout_secs: u64,
    pub visibility_timeout_secs: u64,
    pub drain_deadline_secs: u64,
    pub max_consecutive_spawn_failures: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            queue_url: String::new(),
            queue_name: "default".to_string(),
            read_worker_count: 1,
            process_worker_count: 2,
            internal_queue_capacity: 4,
            batch_size: 10,
            long_poll_wait_secs: 20,
            process_poll_timeout_secs: 1,
            visibility_timeout_secs: 30,
            drain_deadline_secs: 10,
            max_consecutive_spawn_failures: 5,
        }
    }
}

impl WorkerSettings {
    /// Load settings from (in increasing priority order): code defaults, an optional
    /// `relayq.toml` in the current directory, and `RELAYQ_*` environment variables
    /// (e.g. `RELAYQ_PROCESS_WORKER_COUNT=4`).
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = WorkerSettings::default();
        let builder = Config::builder()
            .set_default("queue_url", defaults.queue_url)?
            .set_default("queue_name", defaults.queue_name)?
            .set_default("read_worker_count", defaults.read_worker_count as i64)?
            .set_default("process_worker_count", defaults.process_worker_count as i64)?
            .set_default("internal_queue_capacity", defaults.internal_queue_capacity as i64)?
            .set_default("batch_size", defaults.batch_size as i64)?
            .set_default("long_poll_wait_secs", defaults.long_poll_wait_secs as i64)?
            .set_default("process_poll_timeout_secs", defaults.process_poll_timeout_secs as i64)?
            .set_default("visibility_timeout_secs", defaults.visibility_timeout_secs as i64)?
            .set_default("drain_deadline_secs", defaults.drain_deadline_secs as i64)?
            .set_default(
                "max_consecutive_spawn_failures",
                defaults.max_consecutive_spawn_failures as i64,
            )?
            .add_source(File::with_name("relayq").required(false))
            .add_source(Environment::with_prefix("RELAYQ"));

        builder.build()?.try_deserialize()
    }

    pub fn long_poll_wait(&self) -> Duration {
        Duration::from_secs(self.long_poll_wait_secs)
    }

    pub fn process_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.process_poll_timeout_secs)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn drain_deadline(&self) -> Duration {
        Duration::from_secs(self.drain_deadline_secs)
    }

    pub fn to_manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            read_worker_count: self.read_worker_count,
            process_worker_count: self.process_worker_count,
            internal_queue_capacity: self.internal_queue_capacity,
            batch_size: self.batch_size,
            long_poll_wait: self.long_poll_wait(),
            process_poll_timeout: self.process_poll_timeout(),
            drain_deadline: self.drain_deadline(),
            max_consecutive_spawn_failures: self.max_consecutive_spawn_failures,
        }
    }
}
