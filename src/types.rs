//! Core types for the document store.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Prefix applied to every logical key before it reaches the table.
pub const KEY_PREFIX: &str = "keyv:";

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_millis() as i64)
    }

    /// This timestamp shifted forward by `ttl`, saturating.
    pub fn after(self, ttl: Duration) -> Self {
        let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Namespaced row key, always `keyv:` followed by the logical key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PhysicalKey(String);

impl PhysicalKey {
    pub fn new(logical: &str) -> Self {
        PhysicalKey(format!("{KEY_PREFIX}{logical}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The caller-visible key, if this row belongs to the record namespace.
    pub fn logical(&self) -> Option<&str> {
        self.0.strip_prefix(KEY_PREFIX)
    }
}

impl From<String> for PhysicalKey {
    fn from(raw: String) -> Self {
        PhysicalKey(raw)
    }
}

impl fmt::Debug for PhysicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalKey({})", self.0)
    }
}

impl fmt::Display for PhysicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The wrapper persisted for every record.
///
/// `expires` is `null` for records written without a TTL. When set, reads
/// treat the record as absent once the deadline has passed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub value: Value,
    #[serde(default)]
    pub expires: Option<Timestamp>,
}

impl Envelope {
    pub fn new(value: Value) -> Self {
        Self { value, expires: None }
    }

    pub fn with_expiry(value: Value, expires: Option<Timestamp>) -> Self {
        Self { value, expires }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires.is_some_and(|deadline| deadline <= now)
    }

    /// Serialize to the text stored in the `value` column.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the text stored for `key`.
    pub fn decode(key: &PhysicalKey, raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// A raw table row.
#[derive(Clone, Debug)]
pub struct Row {
    pub key: PhysicalKey,
    pub value: String,
}
