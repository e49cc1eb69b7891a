//! Snapshot Persistence
//!
//! Serializes engine state (operations, alerts, correlation groups) to
//! a durable record and restores it at startup. The cooldown ledger is
//! deliberately excluded: it is transient execution history, and a
//! fresh process has no knowledge of in-flight real-world operations
//! anyway.

mod snapshot;
mod store;

pub use snapshot::{restore_engine, save_engine, EngineSnapshot};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore, StorageError};
