//! Version: a named snapshot lineage under a Space, exactly one of which is
//! `is_default` at any time (property 1) via the clear-all-then-set-one
//! transactional recipe the design notes call for.

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use vdb_core::{now_utc, Error, InternalId, Result, UniqueId};

/// A catalog Version row.
#[derive(Debug, Clone, PartialEq)]
pub struct Version {
    pub id: InternalId,
    pub space_id: InternalId,
    pub unique_id: UniqueId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub tag: Option<String>,
    pub is_default: bool,
    pub created_utc: i64,
    pub updated_utc: i64,
}

const SELECT_COLS: &str =
    "id, space_id, unique_id, name, description, tag, is_default, created_utc, updated_utc";

fn row_to_version(row: &rusqlite::Row) -> rusqlite::Result<Version> {
    Ok(Version {
        id: row.get(0)?,
        space_id: row.get(1)?,
        unique_id: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        tag: row.get(5)?,
        is_default: row.get::<_, i64>(6)? != 0,
        created_utc: row.get(7)?,
        updated_utc: row.get(8)?,
    })
}

/// Create a Version. `unique_id` is computed within this transaction as
/// `COALESCE(MAX(unique_id),0)+1` scoped to `space_id`, so two racing callers
/// can't collide. The first Version of a Space is always default, regardless
/// of `make_default`; subsequent ones respect the flag.
pub fn create(
    tx: &Transaction,
    space_id: InternalId,
    name: Option<&str>,
    description: Option<&str>,
    tag: Option<&str>,
    make_default: bool,
) -> Result<Version> {
    let unique_id: UniqueId = tx.query_row(
        "SELECT COALESCE(MAX(unique_id), 0) + 1 FROM versions WHERE space_id = ?1",
        [space_id],
        |r| r.get(0),
    )?;
    let is_first: bool = tx
        .query_row(
            "SELECT COUNT(*) = 0 FROM versions WHERE space_id = ?1",
            [space_id],
            |r| r.get(0),
        )
        .unwrap_or(true);
    let is_default = is_first || make_default;
    let now = now_utc();
    if is_default {
        tx.execute(
            "UPDATE versions SET is_default = 0 WHERE space_id = ?1",
            [space_id],
        )?;
    }
    tx.execute(
        "INSERT INTO versions (space_id, unique_id, name, description, tag, is_default, created_utc, updated_utc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![space_id, unique_id, name, description, tag, is_default as i64, now],
    )?;
    let id = tx.last_insert_rowid();
    Ok(Version {
        id,
        space_id,
        unique_id,
        name: name.map(String::from),
        description: description.map(String::from),
        tag: tag.map(String::from),
        is_default,
        created_utc: now,
        updated_utc: now,
    })
}

/// Fetch a Version by `(space_id, unique_id)`.
pub fn get_by_unique_id(conn: &Connection, space_id: InternalId, unique_id: UniqueId) -> Result<Version> {
    conn.query_row(
        &format!("SELECT {SELECT_COLS} FROM versions WHERE space_id = ?1 AND unique_id = ?2"),
        params![space_id, unique_id],
        row_to_version,
    )
    .map_err(|_| Error::NotFound(format!("version {unique_id} in space {space_id}")))
}

/// Fetch the current default Version for a Space.
pub fn get_default(conn: &Connection, space_id: InternalId) -> Result<Version> {
    conn.query_row(
        &format!("SELECT {SELECT_COLS} FROM versions WHERE space_id = ?1 AND is_default = 1"),
        [space_id],
        row_to_version,
    )
    .map_err(|_| Error::NotFound(format!("no default version for space {space_id}")))
}

/// Fetch a Version by internal id.
pub fn get_by_id(conn: &Connection, version_id: InternalId) -> Result<Version> {
    conn.query_row(
        &format!("SELECT {SELECT_COLS} FROM versions WHERE id = ?1"),
        [version_id],
        row_to_version,
    )
    .map_err(|_| Error::NotFound(format!("version id {version_id}")))
}

/// List every Version for a Space, ordered by `unique_id`.
pub fn list_for_space(conn: &Connection, space_id: InternalId) -> Result<Vec<Version>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLS} FROM versions WHERE space_id = ?1 ORDER BY unique_id"
    ))?;
    let rows = stmt.query_map([space_id], row_to_version)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// Make `version_id` the sole default within its Space.
pub fn set_default(tx: &Transaction, version_id: InternalId) -> Result<()> {
    let space_id: i64 = tx
        .query_row("SELECT space_id FROM versions WHERE id = ?1", [version_id], |r| {
            r.get(0)
        })
        .map_err(|_| Error::NotFound(format!("version id {version_id}")))?;
    tx.execute("UPDATE versions SET is_default = 0 WHERE space_id = ?1", [space_id])?;
    tx.execute(
        "UPDATE versions SET is_default = 1, updated_utc = ?2 WHERE id = ?1",
        params![version_id, now_utc()],
    )?;
    Ok(())
}

/// Delete a Version and its descendant Indexes/Vectors/Values/Metadata. If
/// the deleted Version was the default and siblings remain, the
/// lowest-`unique_id` sibling becomes the new default (property 1).
pub fn delete(tx: &Transaction, version_id: InternalId) -> Result<()> {
    let (space_id, was_default): (i64, bool) = tx
        .query_row(
            "SELECT space_id, is_default FROM versions WHERE id = ?1",
            [version_id],
            |r| Ok((r.get(0)?, r.get::<_, i64>(1)? != 0)),
        )
        .map_err(|_| Error::NotFound(format!("version id {version_id}")))?;

    tx.execute(
        "DELETE FROM vector_metadata WHERE vector_id IN (SELECT id FROM vectors WHERE version_id = ?1)",
        [version_id],
    )?;
    tx.execute(
        "DELETE FROM bm25_docs WHERE vector_id IN (SELECT id FROM vectors WHERE version_id = ?1)",
        [version_id],
    )?;
    tx.execute(
        "DELETE FROM vector_values WHERE vector_id IN (SELECT id FROM vectors WHERE version_id = ?1)",
        [version_id],
    )?;
    tx.execute("DELETE FROM vectors WHERE version_id = ?1", [version_id])?;
    tx.execute("DELETE FROM indexes WHERE version_id = ?1", [version_id])?;
    tx.execute("DELETE FROM versions WHERE id = ?1", [version_id])?;

    if was_default {
        let next: Option<i64> = tx
            .query_row(
                "SELECT id FROM versions WHERE space_id = ?1 ORDER BY unique_id LIMIT 1",
                [space_id],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(next_id) = next {
            set_default(tx, next_id)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space;
    use vdb_storage::CatalogStore;

    #[test]
    fn first_version_is_always_default() {
        let store = CatalogStore::open_in_memory().unwrap();
        let space_id = store.with_tx(|tx| space::create(tx, "S", None)).unwrap().id;
        let v = store
            .with_tx(|tx| create(tx, space_id, None, None, None, false))
            .unwrap();
        assert!(v.is_default);
        assert_eq!(v.unique_id, 1);
    }

    #[test]
    fn exactly_one_default_after_second_explicit_default() {
        let store = CatalogStore::open_in_memory().unwrap();
        let space_id = store.with_tx(|tx| space::create(tx, "S", None)).unwrap().id;
        store
            .with_tx(|tx| create(tx, space_id, None, None, None, false))
            .unwrap();
        store
            .with_tx(|tx| create(tx, space_id, None, None, None, true))
            .unwrap();
        let versions = store.with_conn(|c| list_for_space(c, space_id)).unwrap();
        assert_eq!(versions.iter().filter(|v| v.is_default).count(), 1);
        let default = store.with_conn(|c| get_default(c, space_id)).unwrap();
        assert_eq!(default.unique_id, 2);
    }

    #[test]
    fn deleting_default_reassigns_to_sibling() {
        let store = CatalogStore::open_in_memory().unwrap();
        let space_id = store.with_tx(|tx| space::create(tx, "S", None)).unwrap().id;
        let v1 = store
            .with_tx(|tx| create(tx, space_id, None, None, None, false))
            .unwrap();
        store
            .with_tx(|tx| create(tx, space_id, None, None, None, true))
            .unwrap();
        store.with_tx(|tx| delete(tx, v1.id)).unwrap();
        // v1 wasn't default so v2 remains default
        let default = store.with_conn(|c| get_default(c, space_id)).unwrap();
        assert_eq!(default.unique_id, 2);
    }

    #[test]
    fn unique_id_auto_increments_per_space() {
        let store = CatalogStore::open_in_memory().unwrap();
        let space_id = store.with_tx(|tx| space::create(tx, "S", None)).unwrap().id;
        let v1 = store
            .with_tx(|tx| create(tx, space_id, None, None, None, false))
            .unwrap();
        let v2 = store
            .with_tx(|tx| create(tx, space_id, None, None, None, false))
            .unwrap();
        let v3 = store
            .with_tx(|tx| create(tx, space_id, None, None, None, false))
            .unwrap();
        assert_eq!((v1.unique_id, v2.unique_id, v3.unique_id), (1, 2, 3));
    }
}
