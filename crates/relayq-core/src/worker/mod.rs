//! Worker roles: shared base behavior, the two pipeline stages, and the supervising manager.

pub mod base;
pub mod manager;
pub mod process_worker;
pub mod read_worker;

pub use base::BaseWorker;
pub use manager::{ManagerConfig, ManagerWorker};
pub use process_worker::ProcessWorker;
pub use read_worker::ReadWorker;
