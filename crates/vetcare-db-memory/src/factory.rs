use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vetcare_storage::DynStorage;

use crate::InMemoryStorage;

/// Supported storage backend types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-memory storage implemented on top of papaya::HashMap
    #[default]
    Memory,
}

/// Constructs a storage instance for the configured backend.
pub fn create_storage(backend: StorageBackend) -> DynStorage {
    match backend {
        StorageBackend::Memory => Arc::new(InMemoryStorage::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vetcare_storage::DocumentStore;

    #[test]
    fn test_backend_deserializes_from_config_name() {
        let backend: StorageBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(backend, StorageBackend::Memory);
        assert_eq!(create_storage(backend).backend_name(), "memory");
    }
}
