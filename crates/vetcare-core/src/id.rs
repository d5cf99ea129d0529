use std::fmt;

/// Human-readable sequential identifier issued by the sequence allocator.
pub type AllocatedId = u64;

/// Generates a new opaque storage identity for a document.
pub fn generate_storage_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// A caller-supplied reference to a document.
///
/// Path parameters may carry either the storage identity or the allocated
/// id. Lookups try the storage identity first and fall back to the
/// allocated id when the raw value is a positive integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    raw: String,
    allocated: Option<AllocatedId>,
}

impl ResourceRef {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let allocated = raw.trim().parse::<AllocatedId>().ok().filter(|id| *id > 0);
        Self { raw, allocated }
    }

    /// Raw value, used as the storage identity.
    pub fn storage_id(&self) -> &str {
        &self.raw
    }

    /// Allocated id interpretation, when the value is a positive integer.
    pub fn allocated_id(&self) -> Option<AllocatedId> {
        self.allocated
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<AllocatedId> for ResourceRef {
    fn from(id: AllocatedId) -> Self {
        Self::parse(id.to_string())
    }
}
