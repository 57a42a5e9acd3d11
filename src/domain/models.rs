use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A tracked device exactly as the devices endpoint returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Device {
    attributes: Map<String, Value>,
}

impl Device {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.attributes.get("fingerprint").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(Value::as_str)
    }

    pub fn min_id(&self) -> Option<i64> {
        cursor_field(&self.attributes, "minId")
    }

    pub fn max_id(&self) -> Option<i64> {
        cursor_field(&self.attributes, "maxId")
    }

    /// Newest history id to start walking back from: `maxId`, else `minId`.
    pub fn start_cursor(&self) -> Option<i64> {
        self.max_id().or_else(|| self.min_id())
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }
}

/// One attestation record. Fields vary between service versions, so every
/// lookup is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryEntry {
    fields: Map<String, Value>,
}

impl HistoryEntry {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn id(&self) -> Option<i64> {
        cursor_field(&self.fields, "id")
    }

    pub fn offset_id(&self) -> Option<i64> {
        cursor_field(&self.fields, "offsetId")
    }

    /// Sort key; entries without an id order first.
    pub fn sort_key(&self) -> i64 {
        self.fields.get("id").and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

// Zero and non-integer ids are unusable as cursors and count as absent.
fn cursor_field(map: &Map<String, Value>, key: &str) -> Option<i64> {
    map.get(key)
        .and_then(Value::as_i64)
        .filter(|value| *value != 0)
}
