//! Space: the top-level catalog entity, named and globally unique.

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use vdb_core::{now_utc, validate_space_name, Error, InternalId, Result};

/// A catalog Space row.
#[derive(Debug, Clone, PartialEq)]
pub struct Space {
    pub id: InternalId,
    pub name: String,
    pub description: Option<String>,
    pub created_utc: i64,
    pub updated_utc: i64,
}

fn row_to_space(row: &rusqlite::Row) -> rusqlite::Result<Space> {
    Ok(Space {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_utc: row.get(3)?,
        updated_utc: row.get(4)?,
    })
}

const SELECT_COLS: &str = "id, name, description, created_utc, updated_utc";

/// Create a new Space. Fails with `Conflict` if `name` is already taken.
pub fn create(tx: &Transaction, name: &str, description: Option<&str>) -> Result<Space> {
    validate_space_name(name)?;
    let now = now_utc();
    let existing: Option<i64> = tx
        .query_row("SELECT id FROM spaces WHERE name = ?1", [name], |r| r.get(0))
        .optional()?;
    if existing.is_some() {
        return Err(Error::Conflict(format!("space {name:?} already exists")));
    }
    tx.execute(
        "INSERT INTO spaces (name, description, created_utc, updated_utc) VALUES (?1, ?2, ?3, ?3)",
        params![name, description, now],
    )?;
    let id = tx.last_insert_rowid();
    Ok(Space {
        id,
        name: name.to_string(),
        description: description.map(|s| s.to_string()),
        created_utc: now,
        updated_utc: now,
    })
}

/// Fetch a Space by its unique name.
pub fn get_by_name(conn: &Connection, name: &str) -> Result<Space> {
    conn.query_row(
        &format!("SELECT {SELECT_COLS} FROM spaces WHERE name = ?1"),
        [name],
        row_to_space,
    )
    .map_err(|_| Error::NotFound(format!("space {name:?}")))
}

/// Fetch a Space by its internal id.
pub fn get_by_id(conn: &Connection, id: InternalId) -> Result<Space> {
    conn.query_row(
        &format!("SELECT {SELECT_COLS} FROM spaces WHERE id = ?1"),
        [id],
        row_to_space,
    )
    .map_err(|_| Error::NotFound(format!("space id {id}")))
}

/// List every Space, ordered by name.
pub fn list(conn: &Connection) -> Result<Vec<Space>> {
    let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLS} FROM spaces ORDER BY name"))?;
    let rows = stmt.query_map([], row_to_space)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// Delete a Space and every descendant row (versions, indexes, vectors,
/// values, metadata, bm25 docs), satisfying property 7 ("delete Space ⇒ no
/// descendant row survives").
pub fn delete(tx: &Transaction, space_id: InternalId) -> Result<()> {
    tx.execute(
        "DELETE FROM vector_metadata WHERE vector_id IN (
            SELECT v.id FROM vectors v JOIN versions ve ON v.version_id = ve.id WHERE ve.space_id = ?1)",
        [space_id],
    )?;
    tx.execute(
        "DELETE FROM bm25_docs WHERE vector_id IN (
            SELECT v.id FROM vectors v JOIN versions ve ON v.version_id = ve.id WHERE ve.space_id = ?1)",
        [space_id],
    )?;
    tx.execute(
        "DELETE FROM vector_values WHERE vector_id IN (
            SELECT v.id FROM vectors v JOIN versions ve ON v.version_id = ve.id WHERE ve.space_id = ?1)",
        [space_id],
    )?;
    tx.execute(
        "DELETE FROM vectors WHERE version_id IN (SELECT id FROM versions WHERE space_id = ?1)",
        [space_id],
    )?;
    tx.execute(
        "DELETE FROM indexes WHERE version_id IN (SELECT id FROM versions WHERE space_id = ?1)",
        [space_id],
    )?;
    tx.execute("DELETE FROM versions WHERE space_id = ?1", [space_id])?;
    tx.execute("DELETE FROM tokens WHERE space_id = ?1", [space_id])?;
    let affected = tx.execute("DELETE FROM spaces WHERE id = ?1", [space_id])?;
    if affected == 0 {
        return Err(Error::NotFound(format!("space id {space_id}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdb_storage::CatalogStore;

    #[test]
    fn create_then_fetch_round_trips() {
        let store = CatalogStore::open_in_memory().unwrap();
        let s = store.with_tx(|tx| create(tx, "S", Some("desc"))).unwrap();
        let fetched = store.with_conn(|c| get_by_name(c, "S")).unwrap();
        assert_eq!(fetched, s);
    }

    #[test]
    fn duplicate_name_is_conflict() {
        let store = CatalogStore::open_in_memory().unwrap();
        store.with_tx(|tx| create(tx, "S", None)).unwrap();
        let err = store.with_tx(|tx| create(tx, "S", None)).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn invalid_name_is_bad_request() {
        let store = CatalogStore::open_in_memory().unwrap();
        let err = store.with_tx(|tx| create(tx, "bad space!", None)).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn delete_removes_the_row() {
        let store = CatalogStore::open_in_memory().unwrap();
        let s = store.with_tx(|tx| create(tx, "S", None)).unwrap();
        store.with_tx(|tx| delete(tx, s.id)).unwrap();
        assert!(store.with_conn(|c| get_by_name(c, "S")).is_err());
    }
}
