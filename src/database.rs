//! The path-addressed document layer.
//!
//! Every record is a JSON value wrapped in an [`Envelope`] and stored under
//! `keyv:<key>`. Writes never update rows in place: a record is rewritten by
//! deleting its row and inserting the new envelope.

use crate::config::{resolve_storage, DatabaseConfig, InitWarning, StorageMode};
use crate::error::{Result, StoreError};
use crate::merge::merged;
use crate::path::{self, Path, PathError};
use crate::table::{quote_ident, Table};
use crate::types::{Envelope, PhysicalKey, Timestamp};
use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};
use serde_json::{Map, Value};
use std::time::Duration;

/// How long a writer waits for another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// An open document store.
///
/// Owns its SQLite connection; the connection is closed when the handle is
/// dropped or [`Database::close`] is called. All operations are synchronous
/// and serialized through the handle.
pub struct Database {
    config: DatabaseConfig,

    /// Quoted table identifier.
    ident: String,

    storage: StorageMode,

    init_warning: Option<InitWarning>,

    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database described by `config`.
    ///
    /// If the data directory cannot be used the database still opens, in
    /// memory, and [`Database::init_warning`] reports why.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        let (storage, init_warning) = resolve_storage(&config);
        let conn = match &storage {
            StorageMode::File(path) => Connection::open(path)?,
            StorageMode::Memory => Connection::open_in_memory()?,
        };
        Self::with_connection(config, storage, init_warning, conn)
    }

    /// Open a transient database with the given table name.
    pub fn open_in_memory(name: impl Into<String>) -> Result<Self> {
        let config = DatabaseConfig::default().with_name(name);
        let conn = Connection::open_in_memory()?;
        Self::with_connection(config, StorageMode::Memory, None, conn)
    }

    fn with_connection(
        config: DatabaseConfig,
        storage: StorageMode,
        init_warning: Option<InitWarning>,
        conn: Connection,
    ) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let ident = quote_ident(&config.name);
        Table::new(&conn, &ident).create_if_absent()?;

        tracing::debug!(
            name = %config.name,
            storage = ?storage,
            transactional = config.transactional,
            "opened database"
        );

        Ok(Self {
            config,
            ident,
            storage,
            init_warning,
            conn: Mutex::new(conn),
        })
    }

    /// Close the connection, surfacing any error SQLite reports.
    pub fn close(self) -> Result<()> {
        self.conn
            .into_inner()
            .close()
            .map_err(|(_, e)| StoreError::Storage(e))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn storage(&self) -> &StorageMode {
        &self.storage
    }

    /// Why the database fell back to memory, if it did.
    pub fn init_warning(&self) -> Option<&InitWarning> {
        self.init_warning.as_ref()
    }

    // --- Connection access ---

    fn with_table<T>(&self, f: impl FnOnce(&Table<'_>) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&Table::new(&conn, &self.ident))
    }

    /// Run a read-modify-write sequence, inside one immediate transaction
    /// when the database is transactional.
    fn with_write<T>(&self, f: impl FnOnce(&Table<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        if !self.config.transactional {
            return f(&Table::new(&conn, &self.ident));
        }

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&Table::new(&tx, &self.ident))?;
        tx.commit()?;
        Ok(out)
    }

    // --- Whole-record operations ---

    /// Every record's value, in table order.
    ///
    /// A single undecodable row fails the whole listing.
    pub fn all(&self) -> Result<Vec<Value>> {
        self.with_table(|table| {
            let now = Timestamp::now();
            let mut values = Vec::new();
            for row in table.list()? {
                let envelope = Envelope::decode(&row.key, &row.value).inspect_err(|_| {
                    tracing::warn!(key = ?row.key.logical(), "undecodable record aborts listing");
                })?;
                if envelope.is_expired(now) {
                    evict(table, &row.key)?;
                    continue;
                }
                values.push(envelope.value);
            }
            Ok(values)
        })
    }

    /// Same as [`Database::all`].
    pub fn array(&self) -> Result<Vec<Value>> {
        self.all()
    }

    /// The record's value, or an empty object if there is no record.
    ///
    /// An absent record and a record holding `{}` look the same here; use
    /// [`Database::fetch`] to tell them apart.
    pub fn get(&self, key: &str) -> Result<Value> {
        Ok(self.fetch(key)?.unwrap_or_else(empty_object))
    }

    /// The record's value, or `None` if there is no record.
    pub fn fetch(&self, key: &str) -> Result<Option<Value>> {
        let key = PhysicalKey::new(key);
        self.with_table(|table| Ok(load(table, &key)?.map(|e| e.value)))
    }

    /// When the record expires, if it has a deadline.
    pub fn expires_at(&self, key: &str) -> Result<Option<Timestamp>> {
        let key = PhysicalKey::new(key);
        self.with_table(|table| Ok(load(table, &key)?.and_then(|e| e.expires)))
    }

    /// Replace the whole record.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let key = PhysicalKey::new(key);
        let envelope = Envelope::new(value.into());
        self.with_write(|table| replace(table, &key, &envelope))
    }

    /// Replace the whole record and expire it after `ttl`.
    pub fn set_with_ttl(&self, key: &str, value: impl Into<Value>, ttl: Duration) -> Result<()> {
        let key = PhysicalKey::new(key);
        let envelope = Envelope::with_expiry(value.into(), Some(Timestamp::now().after(ttl)));
        self.with_write(|table| replace(table, &key, &envelope))
    }

    /// Remove the record. Removing a missing record is a no-op.
    pub fn delete(&self, key: &str) -> Result<()> {
        let key = PhysicalKey::new(key);
        self.with_table(|table| table.delete(&key))
    }

    /// Deep-merge `value` into the record, creating it if needed.
    pub fn ensure(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let key = PhysicalKey::new(key);
        let value = value.into();
        self.with_write(|table| {
            let (base, expires) = split(load(table, &key)?);
            let envelope = Envelope::with_expiry(merged(base, value), expires);
            replace(table, &key, &envelope)
        })
    }

    /// Append `value` to a record whose value is an array.
    pub fn push(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let physical = PhysicalKey::new(key);
        let value = value.into();
        self.with_write(|table| {
            let mut envelope = match load(table, &physical)? {
                Some(envelope) if envelope.value.is_array() => envelope,
                _ => return Err(not_an_array(key, None)),
            };
            if let Value::Array(items) = &mut envelope.value {
                items.push(value);
            }
            replace(table, &physical, &envelope)
        })
    }

    /// Whether a row exists for `key`, whatever it holds.
    ///
    /// The stored value is only decoded to check its deadline, so a row that
    /// no longer decodes still counts as present.
    pub fn has(&self, key: &str) -> Result<bool> {
        let key = PhysicalKey::new(key);
        self.with_table(|table| {
            let Some(raw) = table.get(&key)? else {
                return Ok(false);
            };
            match Envelope::decode(&key, &raw) {
                Ok(envelope) if envelope.is_expired(Timestamp::now()) => {
                    evict(table, &key)?;
                    Ok(false)
                }
                _ => Ok(true),
            }
        })
    }

    /// Replace the record only if it already exists.
    pub fn update(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        let key = PhysicalKey::new(key);
        let value = value.into();
        self.with_write(|table| match load(table, &key)? {
            Some(existing) => {
                replace(table, &key, &Envelope::with_expiry(value, existing.expires))?;
                Ok(true)
            }
            None => Ok(false),
        })
    }

    // --- Path operations ---

    /// The value at `path` inside the record, `None` if the path (or the
    /// record) does not exist.
    pub fn get_at(&self, key: &str, path: &str) -> Result<Option<Value>> {
        let path = Path::parse(path)?;
        let record = self.get(key)?;
        Ok(path::get(&record, &path).cloned())
    }

    /// Write `value` at `path` inside an existing record.
    ///
    /// Returns `false`, writing nothing, when the record does not exist: a
    /// path write never creates a record.
    pub fn set_at(&self, key: &str, path: &str, value: impl Into<Value>) -> Result<bool> {
        let path = Path::parse(path)?;
        let physical = PhysicalKey::new(key);
        let value = value.into();
        self.with_write(|table| {
            let Some(mut envelope) = load(table, &physical)? else {
                tracing::debug!(key, path = %path, "path write skipped, record does not exist");
                return Ok(false);
            };
            path::set(&mut envelope.value, &path, value).map_err(|e| conflict(&path, e))?;
            replace(table, &physical, &envelope)?;
            Ok(true)
        })
    }

    /// Clear `path` inside the record.
    ///
    /// The record is rewritten even when the result is empty; only
    /// [`Database::delete`] removes rows. A missing record is left alone.
    pub fn delete_at(&self, key: &str, path: &str) -> Result<()> {
        let path = Path::parse(path)?;
        let physical = PhysicalKey::new(key);
        self.with_write(|table| {
            let Some(mut envelope) = load(table, &physical)? else {
                return Ok(());
            };
            path::clear(&mut envelope.value, &path);
            replace(table, &physical, &envelope)
        })
    }

    /// Deep-merge `value` into whatever is at `path`, creating the record
    /// and any intermediate containers as needed.
    pub fn ensure_at(&self, key: &str, path: &str, value: impl Into<Value>) -> Result<()> {
        let path = Path::parse(path)?;
        let physical = PhysicalKey::new(key);
        let value = value.into();
        self.with_write(|table| {
            let (base, expires) = split(load(table, &physical)?);
            let mut record = base.unwrap_or_else(empty_object);
            let target = path::get(&record, &path).cloned();
            path::set(&mut record, &path, merged(target, value)).map_err(|e| conflict(&path, e))?;
            replace(table, &physical, &Envelope::with_expiry(record, expires))
        })
    }

    /// Append `value` to the array at `path` and persist the record.
    pub fn push_at(&self, key: &str, path: &str, value: impl Into<Value>) -> Result<()> {
        let path = Path::parse(path)?;
        let physical = PhysicalKey::new(key);
        let value = value.into();
        self.with_write(|table| {
            let Some(mut envelope) = load(table, &physical)? else {
                return Err(not_an_array(key, Some(&path)));
            };
            match path::get_mut(&mut envelope.value, &path).and_then(Value::as_array_mut) {
                Some(items) => items.push(value),
                None => return Err(not_an_array(key, Some(&path))),
            }
            replace(table, &physical, &envelope)
        })
    }

    /// Whether the value at `path` is truthy.
    ///
    /// A path holding `0`, `false`, `""` or `null` reports `false` even
    /// though it exists. Use [`Database::contains_at`] to test existence.
    pub fn has_at(&self, key: &str, path: &str) -> Result<bool> {
        Ok(self.get_at(key, path)?.as_ref().is_some_and(path::is_truthy))
    }

    /// Whether `path` resolves to any value, falsy ones included.
    pub fn contains_at(&self, key: &str, path: &str) -> Result<bool> {
        Ok(self.get_at(key, path)?.is_some())
    }

    /// Write `value` at `path` only if the record exists and the path
    /// already resolves to a value.
    pub fn update_at(&self, key: &str, path: &str, value: impl Into<Value>) -> Result<bool> {
        let path = Path::parse(path)?;
        let physical = PhysicalKey::new(key);
        let value = value.into();
        self.with_write(|table| {
            let Some(mut envelope) = load(table, &physical)? else {
                return Ok(false);
            };
            match path::get_mut(&mut envelope.value, &path) {
                Some(slot) => *slot = value,
                None => return Ok(false),
            }
            replace(table, &physical, &envelope)?;
            Ok(true)
        })
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Read and decode a record, evicting it if it has expired.
fn load(table: &Table<'_>, key: &PhysicalKey) -> Result<Option<Envelope>> {
    let Some(raw) = table.get(key)? else {
        return Ok(None);
    };
    let envelope = Envelope::decode(key, &raw)?;
    if envelope.is_expired(Timestamp::now()) {
        evict(table, key)?;
        return Ok(None);
    }
    Ok(Some(envelope))
}

fn evict(table: &Table<'_>, key: &PhysicalKey) -> Result<()> {
    tracing::trace!(key = %key, "evicting expired record");
    table.delete(key)
}

/// Delete-then-insert.
fn replace(table: &Table<'_>, key: &PhysicalKey, envelope: &Envelope) -> Result<()> {
    let raw = envelope.encode()?;
    table.delete(key)?;
    table.insert(key, &raw)
}

fn split(envelope: Option<Envelope>) -> (Option<Value>, Option<Timestamp>) {
    match envelope {
        Some(e) => (Some(e.value), e.expires),
        None => (None, None),
    }
}

fn conflict(path: &Path, e: PathError) -> StoreError {
    StoreError::PathConflict {
        path: path.to_string(),
        reason: e.to_string(),
    }
}

fn not_an_array(key: &str, path: Option<&Path>) -> StoreError {
    let path = path.map(|p| p.to_string());
    tracing::warn!(key, path = ?path, "push target is not an array");
    StoreError::NotAnArray {
        key: key.to_string(),
        path,
    }
}
