//! Checkpoint persistence.
//!
//! This module provides:
//! - Atomic JSON file operations
//! - The shared, append-only checkpoint store
//! - A cross-process lock so one checkpoint has one writer

mod atomic;
mod lock;
mod store;

pub use atomic::{atomic_read_json, atomic_write_json};
pub use lock::CheckpointLock;
pub use store::{
    load, seen_success_keys, CheckpointReport, CheckpointStore, MigrationResult, MigrationStatus,
};
