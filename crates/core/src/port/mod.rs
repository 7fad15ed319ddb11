// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod snapshot_store;
pub mod time_provider;

// Re-exports
pub use id_provider::{IdProvider, SequentialIdProvider, UuidProvider};
pub use snapshot_store::{MemorySnapshotStore, SnapshotStore};
pub use time_provider::{ManualTimeProvider, SystemTimeProvider, TimeProvider};
