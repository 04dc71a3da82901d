//! # Kv Store
//!
//! This crate provides the key-value persistence contract for the TableDrop
//! application, together with an in-memory store for tests and a file-backed
//! store for the watch daemon.

/// Store contract and error type.
mod store;
pub use store::*;

/// In-memory store backed by a map.
mod memory;
pub use memory::*;

/// File-backed store, one JSON document per key.
mod file;
pub use file::*;
