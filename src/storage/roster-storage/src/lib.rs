//! # Roster Storage
//!
//! Storage abstraction layer for Roster backends.
//!
//! Provides the persistence traits the synchronizer writes through, the
//! shared group/user model, and an in-memory backend for development mode
//! and tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod model;

pub use backend::{GroupStore, UserStore};
pub use error::StorageError;
pub use memory::MemoryBackend;
pub use model::{Group, GroupId, UserRecord};
