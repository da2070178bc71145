//! Vector: the catalog's per-point row, plus its per-Index `vector_values`
//! payload and free-form `vector_metadata` tags.
//!
//! Upsert is idempotent on `(version_id, unique_id)` (property 3): repeating
//! an upsert call with the same id replaces the value and metadata rather
//! than erroring or duplicating rows.

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use vdb_core::{Error, InternalId, Result, UniqueId, ValueKind, VectorPayload};

use crate::codec;

/// A catalog Vector row (identity only; payload lives in `vector_values`).
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRow {
    pub id: InternalId,
    pub version_id: InternalId,
    pub unique_id: UniqueId,
    pub kind: ValueKind,
    pub deleted: bool,
}

fn row_to_vector(row: &rusqlite::Row) -> rusqlite::Result<VectorRow> {
    let kind_s: String = row.get(3)?;
    Ok(VectorRow {
        id: row.get(0)?,
        version_id: row.get(1)?,
        unique_id: row.get(2)?,
        kind: codec::kind_from_str(&kind_s).unwrap_or(ValueKind::Dense),
        deleted: row.get::<_, i64>(4)? != 0,
    })
}

const SELECT_COLS: &str = "id, version_id, unique_id, kind, deleted";

/// Insert the Vector row for `(version_id, unique_id)` if absent, returning
/// its internal id either way (idempotent identity creation).
pub fn ensure(tx: &Transaction, version_id: InternalId, unique_id: UniqueId, kind: ValueKind) -> Result<InternalId> {
    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM vectors WHERE version_id = ?1 AND unique_id = ?2",
            params![version_id, unique_id],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        tx.execute("UPDATE vectors SET kind = ?2, deleted = 0 WHERE id = ?1", params![id, codec::kind_to_str(kind)])?;
        return Ok(id);
    }
    tx.execute(
        "INSERT INTO vectors (version_id, unique_id, kind, deleted) VALUES (?1, ?2, ?3, 0)",
        params![version_id, unique_id, codec::kind_to_str(kind)],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Fetch a Vector row by `(version_id, unique_id)`.
pub fn get_by_unique_id(conn: &Connection, version_id: InternalId, unique_id: UniqueId) -> Result<VectorRow> {
    conn.query_row(
        &format!("SELECT {SELECT_COLS} FROM vectors WHERE version_id = ?1 AND unique_id = ?2"),
        params![version_id, unique_id],
        row_to_vector,
    )
    .map_err(|_| Error::NotFound(format!("vector {unique_id} in version {version_id}")))
}

/// Upsert the payload for `(vector_id, index_id)`, replacing any existing
/// value (last-writer-wins, per property 3).
pub fn set_value(tx: &Transaction, vector_id: InternalId, index_id: InternalId, payload: &VectorPayload) -> Result<()> {
    let bytes = codec::encode_payload(payload);
    tx.execute(
        "INSERT INTO vector_values (vector_id, index_id, kind, payload) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(vector_id, index_id) DO UPDATE SET kind = excluded.kind, payload = excluded.payload",
        params![vector_id, index_id, codec::kind_to_str(payload.kind()), bytes],
    )?;
    Ok(())
}

/// Fetch the decoded payload for `(vector_id, index_id)`, if present.
pub fn get_value(conn: &Connection, vector_id: InternalId, index_id: InternalId) -> Result<Option<VectorPayload>> {
    let bytes: Option<Vec<u8>> = conn
        .query_row(
            "SELECT payload FROM vector_values WHERE vector_id = ?1 AND index_id = ?2",
            params![vector_id, index_id],
            |r| r.get(0),
        )
        .optional()?;
    bytes.map(|b| codec::decode_payload(&b)).transpose()
}

/// Replace all metadata key/value pairs for `vector_id`.
pub fn set_metadata(tx: &Transaction, vector_id: InternalId, metadata: &[(String, String)]) -> Result<()> {
    tx.execute("DELETE FROM vector_metadata WHERE vector_id = ?1", [vector_id])?;
    for (key, value) in metadata {
        tx.execute(
            "INSERT INTO vector_metadata (vector_id, key, value) VALUES (?1, ?2, ?3)",
            params![vector_id, key, value],
        )?;
    }
    Ok(())
}

/// Fetch all metadata key/value pairs for `vector_id`, ordered by key.
pub fn get_metadata(conn: &Connection, vector_id: InternalId) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT key, value FROM vector_metadata WHERE vector_id = ?1 ORDER BY key",
    )?;
    let rows = stmt.query_map([vector_id], |r| Ok((r.get(0)?, r.get(1)?)))?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// Soft-delete a Vector: flips `deleted = 1` so the search path excludes it,
/// without touching its value/metadata/bm25 rows.
pub fn delete(tx: &Transaction, vector_id: InternalId) -> Result<()> {
    let affected = tx.execute("UPDATE vectors SET deleted = 1 WHERE id = ?1", [vector_id])?;
    if affected == 0 {
        return Err(Error::NotFound(format!("vector id {vector_id}")));
    }
    Ok(())
}

/// Compute the next free `unique_id` for an upsert that didn't supply one:
/// `COALESCE(MAX(unique_id),0)+1`, scoped to `version_id`.
pub fn next_unique_id(tx: &Transaction, version_id: InternalId) -> Result<UniqueId> {
    tx.query_row(
        "SELECT COALESCE(MAX(unique_id), 0) + 1 FROM vectors WHERE version_id = ?1",
        [version_id],
        |r| r.get(0),
    )
    .map_err(Into::into)
}

/// `true` if any non-deleted Vector row exists under `version_id`, used to
/// block Space reconfiguration while a Version still carries live vectors.
pub fn any_live_for_version(conn: &Connection, version_id: InternalId) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM vectors WHERE version_id = ?1 AND deleted = 0)",
        [version_id],
        |r| r.get(0),
    )
    .map_err(Into::into)
}

/// Every non-deleted `(unique_id, payload)` pair with a value for `index_id`,
/// for `IndexManager::restore_from_catalog` (the `VectorSource` contract).
pub fn live_vectors_for_index(conn: &Connection, index_id: InternalId) -> Result<Vec<(UniqueId, VectorPayload)>> {
    let mut stmt = conn.prepare(
        "SELECT v.unique_id, vv.payload FROM vector_values vv
         JOIN vectors v ON vv.vector_id = v.id
         WHERE vv.index_id = ?1 AND v.deleted = 0",
    )?;
    let rows = stmt.query_map([index_id], |r| {
        let unique_id: i64 = r.get(0)?;
        let bytes: Vec<u8> = r.get(1)?;
        Ok((unique_id, bytes))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (unique_id, bytes) = row?;
        out.push((unique_id, codec::decode_payload(&bytes)?));
    }
    Ok(out)
}
