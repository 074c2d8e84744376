//! Two-stage reader/processor worker pipeline for SQS-backed background tasks.
//!
//! A [`worker::manager::ManagerWorker`] owns a pool of [`worker::read_worker::ReadWorker`]s that
//! long-poll a [`queue::RemoteQueue`], decode message bodies into [`task_invocation::TaskInvocation`]s
//! (`decode`), and hand them off through a bounded [`internal_queue::InternalQueue`] to a pool of
//! [`worker::process_worker::ProcessWorker`]s that resolve each invocation against a
//! [`resolver::TaskRegistry`] and run it.

pub mod config;
pub mod decode;
pub mod error;
pub mod internal_queue;
pub mod logging;
pub mod queue;
pub mod resolver;
pub mod task_invocation;
pub mod worker;

pub use config::WorkerSettings;
pub use internal_queue::InternalQueue;
pub use queue::RemoteQueue;
pub use resolver::{Task, TaskRegistry};
pub use task_invocation::{QueuedTask, TaskInvocation};
pub use worker::{ManagerConfig, ManagerWorker};
