//! The catalog store: a durable, transactional relational store over SQLite,
//! consumed through `rusqlite`'s prepared-statement and transaction API as
//! an external collaborator injected into the higher layers.
//!
//! This crate owns connection lifecycle and schema migration only; the
//! relational *schema* (tables, invariants) lives in `vdb-catalog`, which
//! treats [`CatalogStore`] as an injected collaborator — the dependency
//! inversion the design notes call for so tests can substitute an in-memory
//! store.

pub mod migrations;

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::Connection;
use vdb_core::{Error, Result};

/// A durable or in-memory handle to the catalog's relational store.
///
/// `rusqlite::Connection` is `!Sync`; every caller goes through the single
/// `Mutex`, which also gives us the "single-writer with respect to the
/// catalog store" serialisation point the concurrency model requires.
pub struct CatalogStore {
    conn: Mutex<Connection>,
    /// `None` for an in-memory catalog.
    path: Option<PathBuf>,
}

impl CatalogStore {
    /// Open (creating if absent) a file-backed catalog at
    /// `data_path/db_name`, applying any migrations not yet recorded in the
    /// `info` row.
    pub fn open(data_path: &Path, db_name: &str) -> Result<Self> {
        if db_name == ":memory:" {
            return Self::open_in_memory();
        }
        std::fs::create_dir_all(data_path)?;
        let full_path = data_path.join(db_name);
        let conn = Connection::open(&full_path)?;
        let store = Self {
            conn: Mutex::new(conn),
            path: Some(full_path),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open a transient in-memory catalog (tests, `DB_NAME=:memory:`).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// The on-disk path, if this store is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run any migrations newer than the schema version recorded in `info`,
    /// creating the `info` row from scratch on a brand-new database.
    ///
    /// Failure of any migration rolls back the enclosing transaction and
    /// surfaces the underlying error, per the migrations contract.
    pub fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        let current: i64 = {
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='table' AND name='info'",
                    [],
                    |_| Ok(()),
                )
                .is_ok();
            if exists {
                conn.query_row("SELECT schema_version FROM info WHERE id=1", [], |row| {
                    row.get(0)
                })
                .unwrap_or(-1)
            } else {
                -1
            }
        };

        let tx = conn.transaction()?;
        for (version, script) in migrations::MIGRATIONS {
            if *version > current {
                tx.execute_batch(script).map_err(|e| {
                    Error::Storage(format!("migration {version} failed: {e}"))
                })?;
                tracing::info!(version, "applied catalog migration");
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Drop every table and re-run migrations from scratch, recording the
    /// latest schema version in a fresh `info` row.
    pub fn reset(&self) -> Result<()> {
        {
            let conn = self.conn.lock();
            conn.execute_batch(migrations::RESET)?;
        }
        self.run_migrations()
    }

    /// Run `f` inside a single SQL transaction, committing on `Ok` and
    /// rolling back on `Err`. This is the building block every domain
    /// manager uses to keep default-flag maintenance and cascading deletes
    /// atomic.
    pub fn with_tx<T>(&self, f: impl FnOnce(&rusqlite::Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Run `f` against a plain (non-transactional) connection reference, for
    /// read-only callers that don't need transactional scope.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Copy the live database to `dest_path` using SQLite's online backup
    /// API, producing an exact, consistent snapshot even while other threads
    /// hold read transactions.
    pub fn backup_to_file(&self, dest_path: &Path) -> Result<()> {
        let conn = self.conn.lock();
        let mut dest = Connection::open(dest_path)?;
        let backup = rusqlite::backup::Backup::new(&conn, &mut dest)?;
        backup.run_to_completion(5, std::time::Duration::from_millis(50), None)?;
        Ok(())
    }

    /// Restore the live database from `src_path` using SQLite's online
    /// backup API, atomically replacing the live contents.
    pub fn restore_from_file(&self, src_path: &Path) -> Result<()> {
        let src = Connection::open(src_path)?;
        let mut conn = self.conn.lock();
        let backup = rusqlite::backup::Backup::new(&src, &mut conn)?;
        backup.run_to_completion(5, std::time::Duration::from_millis(50), None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_in_memory_store_reaches_latest_schema() {
        let store = CatalogStore::open_in_memory().unwrap();
        let version: i64 = store
            .with_conn(|c| {
                c.query_row("SELECT schema_version FROM info WHERE id=1", [], |r| r.get(0))
                    .map_err(Into::into)
            })
            .unwrap();
        assert_eq!(version, migrations::latest_schema_version());
    }

    #[test]
    fn reopening_an_already_migrated_store_is_idempotent() {
        let store = CatalogStore::open_in_memory().unwrap();
        store.run_migrations().unwrap();
        store.run_migrations().unwrap();
    }

    #[test]
    fn reset_drops_and_rebuilds_tables() {
        let store = CatalogStore::open_in_memory().unwrap();
        store
            .with_conn(|c| {
                c.execute(
                    "INSERT INTO spaces (name, created_utc, updated_utc) VALUES (?1, 0, 0)",
                    ["s1"],
                )
                .map_err(Into::into)
            })
            .unwrap();
        store.reset().unwrap();
        let count: i64 = store
            .with_conn(|c| {
                c.query_row("SELECT COUNT(*) FROM spaces", [], |r| r.get(0))
                    .map_err(Into::into)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn backup_and_restore_round_trip() {
        let store = CatalogStore::open_in_memory().unwrap();
        store
            .with_conn(|c| {
                c.execute(
                    "INSERT INTO spaces (name, created_utc, updated_utc) VALUES (?1, 0, 0)",
                    ["s1"],
                )
                .map_err(Into::into)
            })
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let backup_path = dir.path().join("backup.db");
        store.backup_to_file(&backup_path).unwrap();

        let fresh = CatalogStore::open_in_memory().unwrap();
        fresh.restore_from_file(&backup_path).unwrap();
        let count: i64 = fresh
            .with_conn(|c| {
                c.query_row("SELECT COUNT(*) FROM spaces", [], |r| r.get(0))
                    .map_err(Into::into)
            })
            .unwrap();
        assert_eq!(count, 1);
    }
}
