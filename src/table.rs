//! The keyed two-column table every record lives in.
//!
//! This is the only module that speaks SQL. It exposes the primitive row
//! operations the document layer is built on and knows nothing about
//! envelopes or paths.

use crate::error::Result;
use crate::types::{PhysicalKey, Row};
use rusqlite::{params, Connection, OptionalExtension};

/// Quote `name` as an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Row operations on one table, borrowed from a connection or transaction.
pub struct Table<'c> {
    conn: &'c Connection,
    ident: &'c str,
}

impl<'c> Table<'c> {
    /// `ident` must already be quoted with [`quote_ident`].
    pub fn new(conn: &'c Connection, ident: &'c str) -> Self {
        Self { conn, ident }
    }

    /// Create the `key`/`value` table if it does not exist yet.
    pub fn create_if_absent(&self) -> Result<()> {
        self.conn.execute(
            &format!(
                r#"CREATE TABLE IF NOT EXISTS {}("key" VARCHAR(255) PRIMARY KEY, "value" TEXT)"#,
                self.ident
            ),
            [],
        )?;
        Ok(())
    }

    /// Insert a row. Fails with a constraint error if the key exists.
    pub fn insert(&self, key: &PhysicalKey, value: &str) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(&format!(
            r#"INSERT INTO {} ("key", "value") VALUES (?1, ?2)"#,
            self.ident
        ))?;
        stmt.execute(params![key.as_str(), value])?;
        Ok(())
    }

    /// Delete a row; a missing key is not an error.
    pub fn delete(&self, key: &PhysicalKey) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!(r#"DELETE FROM {} WHERE "key" = ?1"#, self.ident))?;
        stmt.execute(params![key.as_str()])?;
        Ok(())
    }

    /// Fetch the stored text for a key.
    pub fn get(&self, key: &PhysicalKey) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            r#"SELECT "value" FROM {} WHERE "key" = ?1"#,
            self.ident
        ))?;
        let value = stmt
            .query_row(params![key.as_str()], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Every row in rowid order.
    pub fn list(&self) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            r#"SELECT "key", "value" FROM {} ORDER BY rowid"#,
            self.ident
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Row {
                    key: PhysicalKey::from(row.get::<_, String>(0)?),
                    value: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
