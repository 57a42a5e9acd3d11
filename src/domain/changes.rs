use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::models::HistoryEntry;
use crate::domain::snapshot::Snapshot;

/// Fields that change on nearly every attestation and carry no state.
pub const DEFAULT_IGNORED_FIELDS: &[&str] = &[
    "id",
    "offsetId",
    "verifiedTimeFirst",
    "verifiedTimeLast",
    "timestamp",
    "time",
    "_id",
    "verifiedBootHash",
    "osPatchLevel",
    "vendorPatchLevel",
    "bootPatchLevel",
];

/// Timestamp candidates, most authoritative first.
const TIMESTAMP_FIELDS: &[&str] = &["verifiedTimeLast", "verifiedTimeFirst", "time", "timestamp"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    /// `None` when the field did not exist on the previous entry.
    pub old: Option<Value>,
    pub new: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEntry {
    pub entry_id: Option<i64>,
    pub timestamp: Option<String>,
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceChangeLog {
    pub fingerprint: String,
    pub name: Option<String>,
    pub history_len: usize,
    pub entries: Vec<ChangeEntry>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeReport {
    pub devices: Vec<DeviceChangeLog>,
}

impl ChangeReport {
    pub fn change_count(&self) -> usize {
        self.devices.iter().map(|device| device.entries.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct ChangeDetector {
    ignored_fields: BTreeSet<String>,
    flag_new_fields: bool,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self {
            ignored_fields: DEFAULT_IGNORED_FIELDS
                .iter()
                .map(|field| (*field).to_string())
                .collect(),
            flag_new_fields: false,
        }
    }
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extra_ignored<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Also report fields that appear on an entry but not on its predecessor.
    pub fn flag_new_fields(mut self, enabled: bool) -> Self {
        self.flag_new_fields = enabled;
        self
    }

    pub fn is_ignored(&self, field: &str) -> bool {
        self.ignored_fields.contains(field)
    }

    pub fn detect(&self, snapshot: &Snapshot) -> ChangeReport {
        let devices = snapshot
            .iter()
            .map(|(fingerprint, record)| DeviceChangeLog {
                fingerprint: fingerprint.to_string(),
                name: record.device.name().map(str::to_string),
                history_len: record.history.len(),
                entries: self.device_changes(&record.history),
            })
            .collect();

        ChangeReport { devices }
    }

    pub fn device_changes(&self, history: &[HistoryEntry]) -> Vec<ChangeEntry> {
        let mut ordered: Vec<&HistoryEntry> = history.iter().collect();
        ordered.sort_by_key(|entry| entry.sort_key());

        ordered
            .windows(2)
            .filter_map(|pair| {
                let (prev, curr) = (pair[0], pair[1]);
                let changes = self.compare(prev, curr);
                if changes.is_empty() {
                    return None;
                }
                Some(ChangeEntry {
                    entry_id: curr.id(),
                    timestamp: extract_timestamp(curr).and_then(format_timestamp),
                    changes,
                })
            })
            .collect()
    }

    pub fn compare(&self, prev: &HistoryEntry, curr: &HistoryEntry) -> Vec<FieldChange> {
        curr.fields()
            .filter(|(field, _)| !self.is_ignored(field))
            .filter_map(|(field, new)| match prev.get(field) {
                Some(old) if !same_value(old, new) => Some(FieldChange {
                    field: field.clone(),
                    old: Some(old.clone()),
                    new: new.clone(),
                }),
                Some(_) => None,
                None if self.flag_new_fields => Some(FieldChange {
                    field: field.clone(),
                    old: None,
                    new: new.clone(),
                }),
                None => None,
            })
            .collect()
    }
}

/// JSON equality where numbers compare by value, so `2` equals `2.0`.
pub fn same_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return a == b;
            }
            if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
                return a == b;
            }
            a.as_f64() == b.as_f64()
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_value(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| same_value(x, y)))
        }
        _ => left == right,
    }
}

pub fn extract_timestamp(entry: &HistoryEntry) -> Option<&Value> {
    TIMESTAMP_FIELDS
        .iter()
        .filter_map(|field| entry.get(field))
        .find(|value| !value.is_null())
}

/// Renders an epoch-millisecond value as UTC, or passes the raw value through
/// when it is not a usable timestamp.
pub fn format_timestamp(value: &Value) -> Option<String> {
    let millis = match value {
        Value::Null => return None,
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        _ => None,
    };

    match millis.and_then(DateTime::<Utc>::from_timestamp_millis) {
        Some(datetime) => Some(datetime.format(TIMESTAMP_FORMAT).to_string()),
        None => Some(display_value(value)),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for ChangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for device in &self.devices {
            if device.history_len == 0 {
                writeln!(f, "{}: no history", device.fingerprint)?;
                continue;
            }

            writeln!(f)?;
            writeln!(f, "==============================")?;
            writeln!(
                f,
                "Device: {} ({})",
                device.name.as_deref().unwrap_or("<unnamed>"),
                device.fingerprint
            )?;
            writeln!(f, "==============================")?;

            for entry in &device.entries {
                writeln!(f)?;
                writeln!(
                    f,
                    "[Change] {}",
                    entry.timestamp.as_deref().unwrap_or("<no timestamp>")
                )?;
                writeln!(f, "Changed fields:")?;
                for change in &entry.changes {
                    let old = change
                        .old
                        .as_ref()
                        .map_or_else(|| "<absent>".to_string(), display_value);
                    writeln!(
                        f,
                        "  - {}: {} → {}",
                        change.field,
                        old,
                        display_value(&change.new)
                    )?;
                }
            }
        }
        Ok(())
    }
}
