//! Remote queue capability and its concrete backends.

pub mod capability;
pub mod in_memory;
pub mod sqs;

pub use capability::{RawMessage, RemoteQueue};
pub use in_memory::InMemoryRemoteQueue;
pub use sqs::SqsRemoteQueue;
