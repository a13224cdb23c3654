//! Embedded SQLite store
//!
//! One writer connection per process; the ownership lease (see [`owner`])
//! decides who that is. Repos are free functions over `&Connection` so they
//! compose with transactions.

pub mod files;
pub mod owner;
pub mod relations;
pub mod schema;
pub mod symbols;

use crate::core::error::Result;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use tracing::info;

pub use files::FileRow;
pub use owner::OwnerRole;
pub use relations::{RelationQuery, RelationRow};
pub use symbols::{SymbolQuery, SymbolRow};

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (and initialize if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// An in-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let version: Option<i64> = conn
            .query_row(
                "SELECT version FROM schema_version LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .unwrap_or(None);

        if version != Some(schema::SCHEMA_VERSION) {
            conn.execute_batch("BEGIN;")?;
            conn.execute_batch(schema::SCHEMA)?;
            conn.execute("DELETE FROM schema_version", [])?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [schema::SCHEMA_VERSION],
            )?;
            conn.execute_batch("COMMIT;")?;
            info!("Initialized store schema v{}", schema::SCHEMA_VERSION);
        }

        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Deferred write transaction; only the owner process enters these.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    /// Write-intent transaction, used by ownership acquisition to close the
    /// race between two candidates reading an empty row at once.
    pub fn immediate_transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Delete every file, symbol and relation row (ownership is kept).
    pub fn wipe(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM relations", [])?;
        tx.execute("DELETE FROM symbols", [])?;
        tx.execute("DELETE FROM files", [])?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_initializes_once() {
        let store = Store::open_in_memory().unwrap();
        let version: i64 = store
            .conn()
            .query_row("SELECT version FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(".symdex/index.db");
        let _store = Store::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let store = Store::open_in_memory().unwrap();
        let result = store.conn().execute(
            "INSERT INTO relations (project, rel_type, src_file_path, dst_project, dst_file_path)
             VALUES ('p', 'imports', 'a.ts', 'p', 'missing.ts')",
            [],
        );
        assert!(result.is_err());
    }
}
