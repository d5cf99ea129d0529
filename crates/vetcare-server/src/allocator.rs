//! Sequential id allocation for clinical entities.

use vetcare_core::{AllocatedId, Counter, CounterName};
use vetcare_storage::{DynStorage, SequenceStore, StorageError};

use crate::error::LifecycleError;

/// Issues allocated ids from named counters kept in storage.
///
/// Every call round-trips to the backend's atomic increment; nothing is
/// cached in process, so any number of server tasks may allocate
/// concurrently. Issued values are never released.
#[derive(Clone)]
pub struct SequenceAllocator {
    storage: DynStorage,
}

impl SequenceAllocator {
    pub fn new(storage: DynStorage) -> Self {
        Self { storage }
    }

    /// Returns the next value for `counter`, creating the counter on first use.
    ///
    /// Fails instead of returning a placeholder when the increment could not
    /// be applied. A backend reporting zero is treated as a failure too.
    pub async fn next_value(&self, counter: CounterName) -> Result<AllocatedId, LifecycleError> {
        let value = self
            .storage
            .next_value(counter.as_str())
            .await
            .map_err(|e| {
                tracing::error!(counter = %counter, error = %e, "sequence increment failed");
                LifecycleError::Storage(e)
            })?;
        if value == 0 {
            tracing::error!(counter = %counter, "sequence backend issued zero");
            return Err(StorageError::internal(format!("counter '{counter}' issued zero")).into());
        }
        tracing::debug!(counter = %counter, value, "allocated id");
        Ok(value)
    }

    /// Last value issued for `counter`, if any.
    pub async fn current_value(
        &self,
        counter: CounterName,
    ) -> Result<Option<AllocatedId>, LifecycleError> {
        Ok(self.storage.current_value(counter.as_str()).await?)
    }

    /// Counter rows for every entity type that has issued at least one id.
    pub async fn snapshot(&self) -> Result<Vec<Counter>, LifecycleError> {
        let mut counters = Vec::with_capacity(CounterName::ALL.len());
        for name in CounterName::ALL {
            if let Some(seq) = self.current_value(name).await? {
                counters.push(Counter {
                    name: name.as_str().to_string(),
                    seq,
                });
            }
        }
        Ok(counters)
    }
}
