use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Named sequence counters, one per clinical entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterName {
    Record,
    Prescription,
    Vaccination,
    #[serde(rename = "labresult")]
    LabResult,
}

impl CounterName {
    pub const ALL: [CounterName; 4] = [
        CounterName::Record,
        CounterName::Prescription,
        CounterName::Vaccination,
        CounterName::LabResult,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::Prescription => "prescription",
            Self::Vaccination => "vaccination",
            Self::LabResult => "labresult",
        }
    }
}

impl fmt::Display for CounterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounterName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CounterName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| CoreError::invalid_id(format!("unknown counter '{s}'")))
    }
}

/// Persisted counter row: `{ name, seq }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub name: String,
    pub seq: u64,
}
