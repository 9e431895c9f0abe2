//! # pathkv
//!
//! An embedded key-value store that keeps JSON documents in a single SQLite
//! table and lets callers read and write nested parts of them by path.
//!
//! ## Core Concepts
//!
//! - **Records**: a JSON value stored under a caller-chosen key
//! - **Paths**: `profile.icon`, `tags[0]` and friends address inside a record
//! - **Envelope**: the `{value, expires}` wrapper actually persisted
//! - **Rewrites**: every write deletes the old row and inserts a new one
//!
//! ## Example
//!
//! ```ignore
//! use pathkv::{Database, DatabaseConfig};
//! use serde_json::json;
//!
//! let db = Database::open(DatabaseConfig::default().with_name("users"))?;
//!
//! db.set("user-1", json!({"name": "Ann", "tags": []}))?;
//! db.push_at("user-1", "tags", "vip")?;
//! db.ensure_at("user-1", "profile", json!({"icon": "ann.png"}))?;
//!
//! assert_eq!(db.get_at("user-1", "tags")?, Some(json!(["vip"])));
//! assert!(db.has_at("user-1", "profile.icon")?);
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod merge;
pub mod path;
pub mod table;
pub mod types;

// Re-exports
pub use config::{DatabaseConfig, InitWarning, StorageMode};
pub use database::Database;
pub use error::{Result, StoreError};
pub use path::{Path, PathError, Segment};
pub use types::{Envelope, PhysicalKey, Timestamp, KEY_PREFIX};
