use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::models::{Device, HistoryEntry};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceHistory {
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot root must be a JSON object keyed by fingerprint")]
    InvalidRoot,
    #[error("snapshot record for {fingerprint} is malformed: {source}")]
    InvalidRecord {
        fingerprint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Full per-device history from one fetch run, in device listing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    records: Vec<(String, DeviceHistory)>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a device record. A fingerprint seen before keeps its position and
    /// takes the new record.
    pub fn insert(&mut self, fingerprint: impl Into<String>, record: DeviceHistory) {
        let fingerprint = fingerprint.into();
        match self.records.iter_mut().find(|(key, _)| *key == fingerprint) {
            Some((_, existing)) => *existing = record,
            None => self.records.push((fingerprint, record)),
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<&DeviceHistory> {
        self.records
            .iter()
            .find(|(key, _)| key == fingerprint)
            .map(|(_, record)| record)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeviceHistory)> {
        self.records
            .iter()
            .map(|(fingerprint, record)| (fingerprint.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_entries(&self) -> usize {
        self.records
            .iter()
            .map(|(_, record)| record.history.len())
            .sum()
    }

    pub fn to_json(&self) -> Result<Value, SnapshotError> {
        let mut root = Map::new();
        for (fingerprint, record) in &self.records {
            let value = serde_json::to_value(record).map_err(SnapshotError::Encode)?;
            root.insert(fingerprint.clone(), value);
        }
        Ok(Value::Object(root))
    }

    pub fn from_json(value: Value) -> Result<Self, SnapshotError> {
        let Value::Object(root) = value else {
            return Err(SnapshotError::InvalidRoot);
        };

        let mut snapshot = Self::new();
        for (fingerprint, raw) in root {
            let record = serde_json::from_value(raw).map_err(|source| {
                SnapshotError::InvalidRecord {
                    fingerprint: fingerprint.clone(),
                    source,
                }
            })?;
            snapshot.insert(fingerprint, record);
        }
        Ok(snapshot)
    }
}
