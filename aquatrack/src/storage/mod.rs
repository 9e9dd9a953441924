//! Storage module
//!
//! Provides the local per-user snapshot slot and the remote snapshot
//! document adapter.

pub mod drive;
pub mod local_store;

pub use drive::{DriveStore, FileHandle, RemoteStore};
pub use local_store::LocalStore;
