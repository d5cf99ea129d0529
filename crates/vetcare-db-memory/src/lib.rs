//! In-memory storage backend for VetCare server.
//!
//! This crate implements the `SequenceStore`, `DocumentStore` and
//! `IntentJournal` traits from `vetcare-storage` on top of papaya lock-free
//! hash maps, so concurrent request handlers never block each other.
//!
//! # Example
//!
//! ```ignore
//! use vetcare_db_memory::InMemoryStorage;
//! use vetcare_storage::SequenceStore;
//!
//! let storage = InMemoryStorage::new();
//! let first = storage.next_value("record").await?;
//! assert_eq!(first, 1);
//! ```

pub mod factory;
mod documents;
mod journal;
mod sequence;
pub mod storage;

pub use factory::{StorageBackend, create_storage};
pub use storage::InMemoryStorage;

// Re-export the storage traits for convenience
pub use vetcare_storage::{DocumentStore, DynStorage, IntentJournal, SequenceStore, StorageError};
