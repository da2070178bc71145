//! Snapshot: bookkeeping row recording a backup request. The archive
//! create/restore logic (zip + manifest) lives in `vdb-snapshot`, which reads
//! and writes these rows through the `Catalog` facade.

use rusqlite::{params, Connection, Transaction};
use vdb_core::{now_utc, Error, InternalId, Result};

/// A catalog Snapshot bookkeeping row.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub id: InternalId,
    pub request_json: String,
    pub file_name: String,
    pub created_utc: i64,
}

fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<SnapshotRow> {
    Ok(SnapshotRow {
        id: row.get(0)?,
        request_json: row.get(1)?,
        file_name: row.get(2)?,
        created_utc: row.get(3)?,
    })
}

const SELECT_COLS: &str = "id, request_json, file_name, created_utc";

/// Record a Snapshot row for an archive named `file_name`.
pub fn create(tx: &Transaction, request_json: &str, file_name: &str) -> Result<SnapshotRow> {
    let now = now_utc();
    tx.execute(
        "INSERT INTO snapshots (request_json, file_name, created_utc) VALUES (?1, ?2, ?3)",
        params![request_json, file_name, now],
    )?;
    Ok(SnapshotRow {
        id: tx.last_insert_rowid(),
        request_json: request_json.to_string(),
        file_name: file_name.to_string(),
        created_utc: now,
    })
}

/// Fetch a Snapshot row by id.
pub fn get_by_id(conn: &Connection, id: InternalId) -> Result<SnapshotRow> {
    conn.query_row(
        &format!("SELECT {SELECT_COLS} FROM snapshots WHERE id = ?1"),
        [id],
        row_to_snapshot,
    )
    .map_err(|_| Error::NotFound(format!("snapshot id {id}")))
}

/// List every Snapshot row, most recently created first — the ordering
/// `vdb-snapshot` uses to pick a deterministic "latest" restore target.
pub fn list_latest_first(conn: &Connection) -> Result<Vec<SnapshotRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLS} FROM snapshots ORDER BY created_utc DESC, id DESC"
    ))?;
    let rows = stmt.query_map([], row_to_snapshot)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdb_storage::CatalogStore;

    #[test]
    fn create_then_fetch_round_trips() {
        let store = CatalogStore::open_in_memory().unwrap();
        let row = store
            .with_tx(|tx| create(tx, "{}", "snapshot_1.zip"))
            .unwrap();
        let fetched = store.with_conn(|c| get_by_id(c, row.id)).unwrap();
        assert_eq!(fetched, row);
    }

    #[test]
    fn list_latest_first_orders_by_created_utc_descending() {
        let store = CatalogStore::open_in_memory().unwrap();
        store.with_tx(|tx| create(tx, "{}", "a.zip")).unwrap();
        store.with_tx(|tx| create(tx, "{}", "b.zip")).unwrap();
        let rows = store.with_conn(list_latest_first).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].file_name, "b.zip");
    }
}
