//! # vetcare-storage
//!
//! Storage abstraction layer for the VetCare server.
//!
//! This crate defines the traits and types that all storage backends must implement.
//! It does not contain any implementations - those are provided by separate crates.
//!
//! ## Overview
//!
//! - [`SequenceStore`]: named counters with an atomic increment-and-fetch
//!   that creates the counter on first use.
//! - [`DocumentStore`]: JSON document collections keyed by storage identity,
//!   with unique secondary indexes and field-equality queries.
//! - [`IntentJournal`]: a compensating-action log used to reconcile
//!   multi-collection deletes interrupted by a crash.
//!
//! There are no multi-document transactions and no storage-level hooks;
//! callers sequence cross-collection work themselves.
//!
//! ## Example
//!
//! ```ignore
//! use vetcare_storage::{DocumentStore, FieldFilter, StorageError};
//!
//! async fn prescriptions_of(
//!     storage: &dyn DocumentStore,
//!     record_id: u64,
//! ) -> Result<Vec<Document>, StorageError> {
//!     storage
//!         .find("prescriptions", Some(&FieldFilter::eq("RecordId", record_id)))
//!         .await
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::{DocumentStore, IntentJournal, SequenceStore, Storage};
pub use types::{CascadeIntent, Document, FieldFilter, ID_FIELD};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared storage trait object.
pub type DynStorage = std::sync::Arc<dyn Storage>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::traits::{DocumentStore, IntentJournal, SequenceStore, Storage};
    pub use crate::types::{CascadeIntent, Document, FieldFilter};
    pub use crate::{DynStorage, StorageResult};
}
