//! Index: the catalog's ANN configuration row. Row CRUD only — the live HNSW
//! structure lives in `vdb-annindex::IndexManager`, owned by the `Catalog`
//! facade (see `lib.rs`) through the `IndexLru`.

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use vdb_core::{now_utc, Error, HnswConfig, InternalId, Metric, QuantConfig, Result, ValueKind};

use crate::codec;

/// A catalog Index row.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRow {
    pub id: InternalId,
    pub version_id: InternalId,
    pub value_kind: ValueKind,
    pub name: String,
    pub metric: Metric,
    pub dimension: usize,
    pub hnsw_cfg: HnswConfig,
    pub quant_cfg: QuantConfig,
    pub is_default: bool,
    pub created_utc: i64,
    pub updated_utc: i64,
}

const SELECT_COLS: &str =
    "id, version_id, value_kind, name, metric, dimension, hnsw_cfg, quant_cfg, is_default, created_utc, updated_utc";

fn row_to_index(row: &rusqlite::Row) -> rusqlite::Result<IndexRow> {
    let value_kind_s: String = row.get(2)?;
    let metric_s: String = row.get(4)?;
    let hnsw_s: String = row.get(6)?;
    let quant_s: String = row.get(7)?;
    Ok(IndexRow {
        id: row.get(0)?,
        version_id: row.get(1)?,
        value_kind: codec::kind_from_str(&value_kind_s)
            .unwrap_or(ValueKind::Dense),
        name: row.get(3)?,
        metric: metric_from_str(&metric_s),
        dimension: row.get::<_, i64>(5)? as usize,
        hnsw_cfg: codec::decode_hnsw_config(&hnsw_s).unwrap_or_default(),
        quant_cfg: codec::decode_quant_config(&quant_s).unwrap_or_default(),
        is_default: row.get::<_, i64>(8)? != 0,
        created_utc: row.get(9)?,
        updated_utc: row.get(10)?,
    })
}

fn metric_to_str(m: Metric) -> &'static str {
    match m {
        Metric::L2 => "l2",
        Metric::Cosine => "cosine",
        Metric::InnerProduct => "inner_product",
    }
}

fn metric_from_str(s: &str) -> Metric {
    match s {
        "cosine" => Metric::Cosine,
        "inner_product" => Metric::InnerProduct,
        _ => Metric::L2,
    }
}

/// Create an Index row. The first Index of a Version is always default.
#[allow(clippy::too_many_arguments)]
pub fn create(
    tx: &Transaction,
    version_id: InternalId,
    name: &str,
    value_kind: ValueKind,
    metric: Metric,
    dimension: usize,
    hnsw_cfg: HnswConfig,
    quant_cfg: QuantConfig,
    make_default: bool,
) -> Result<IndexRow> {
    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM indexes WHERE version_id = ?1 AND name = ?2",
            params![version_id, name],
            |r| r.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(Error::Conflict(format!(
            "index {name:?} already exists in version {version_id}"
        )));
    }
    let is_first: bool = tx
        .query_row(
            "SELECT COUNT(*) = 0 FROM indexes WHERE version_id = ?1",
            [version_id],
            |r| r.get(0),
        )
        .unwrap_or(true);
    let is_default = is_first || make_default;
    let now = now_utc();
    if is_default {
        tx.execute(
            "UPDATE indexes SET is_default = 0 WHERE version_id = ?1",
            [version_id],
        )?;
    }
    tx.execute(
        "INSERT INTO indexes (version_id, value_kind, name, metric, dimension, hnsw_cfg, quant_cfg, is_default, created_utc, updated_utc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            version_id,
            codec::kind_to_str(value_kind),
            name,
            metric_to_str(metric),
            dimension as i64,
            codec::encode_hnsw_config(&hnsw_cfg),
            codec::encode_quant_config(&quant_cfg),
            is_default as i64,
            now,
        ],
    )?;
    let id = tx.last_insert_rowid();
    Ok(IndexRow {
        id,
        version_id,
        value_kind,
        name: name.to_string(),
        metric,
        dimension,
        hnsw_cfg,
        quant_cfg,
        is_default,
        created_utc: now,
        updated_utc: now,
    })
}

/// Fetch an Index by `(version_id, name)`.
pub fn get_by_name(conn: &Connection, version_id: InternalId, name: &str) -> Result<IndexRow> {
    conn.query_row(
        &format!("SELECT {SELECT_COLS} FROM indexes WHERE version_id = ?1 AND name = ?2"),
        params![version_id, name],
        row_to_index,
    )
    .map_err(|_| Error::NotFound(format!("index {name:?} in version {version_id}")))
}

/// Fetch an Index by internal id.
pub fn get_by_id(conn: &Connection, index_id: InternalId) -> Result<IndexRow> {
    conn.query_row(
        &format!("SELECT {SELECT_COLS} FROM indexes WHERE id = ?1"),
        [index_id],
        row_to_index,
    )
    .map_err(|_| Error::NotFound(format!("index id {index_id}")))
}

/// Fetch the default Index of a Version.
pub fn get_default(conn: &Connection, version_id: InternalId) -> Result<IndexRow> {
    conn.query_row(
        &format!("SELECT {SELECT_COLS} FROM indexes WHERE version_id = ?1 AND is_default = 1"),
        [version_id],
        row_to_index,
    )
    .map_err(|_| Error::NotFound(format!("no default index for version {version_id}")))
}

/// List every Index of a Version, ordered by id (insertion order).
pub fn list_for_version(conn: &Connection, version_id: InternalId) -> Result<Vec<IndexRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLS} FROM indexes WHERE version_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt.query_map([version_id], row_to_index)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// Make `index_id` the sole default within its Version.
pub fn set_default(tx: &Transaction, index_id: InternalId) -> Result<()> {
    let version_id: i64 = tx
        .query_row("SELECT version_id FROM indexes WHERE id = ?1", [index_id], |r| {
            r.get(0)
        })
        .map_err(|_| Error::NotFound(format!("index id {index_id}")))?;
    tx.execute("UPDATE indexes SET is_default = 0 WHERE version_id = ?1", [version_id])?;
    tx.execute(
        "UPDATE indexes SET is_default = 1, updated_utc = ?2 WHERE id = ?1",
        params![index_id, now_utc()],
    )?;
    Ok(())
}

/// Delete an Index and its `vector_values` rows. If it was the default and a
/// sibling Index remains, the most-recently-created sibling becomes the new
/// default (Scenario D / property 2).
pub fn delete(tx: &Transaction, index_id: InternalId) -> Result<()> {
    let (version_id, was_default): (i64, bool) = tx
        .query_row(
            "SELECT version_id, is_default FROM indexes WHERE id = ?1",
            [index_id],
            |r| Ok((r.get(0)?, r.get::<_, i64>(1)? != 0)),
        )
        .map_err(|_| Error::NotFound(format!("index id {index_id}")))?;

    tx.execute("DELETE FROM vector_values WHERE index_id = ?1", [index_id])?;
    tx.execute("DELETE FROM indexes WHERE id = ?1", [index_id])?;

    if was_default {
        let next: Option<i64> = tx
            .query_row(
                "SELECT id FROM indexes WHERE version_id = ?1 ORDER BY id DESC LIMIT 1",
                [version_id],
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
    use crate::{space, version};
    use vdb_storage::CatalogStore;

    fn setup_version(store: &CatalogStore) -> i64 {
        let space_id = store.with_tx(|tx| space::create(tx, "S", None)).unwrap().id;
        store
            .with_tx(|tx| version::create(tx, space_id, None, None, None, false))
            .unwrap()
            .id
    }

    #[test]
    fn first_index_is_default() {
        let store = CatalogStore::open_in_memory().unwrap();
        let version_id = setup_version(&store);
        let idx = store
            .with_tx(|tx| {
                create(
                    tx,
                    version_id,
                    "primary",
                    ValueKind::Dense,
                    Metric::L2,
                    4,
                    HnswConfig::default(),
                    QuantConfig::None,
                    false,
                )
            })
            .unwrap();
        assert!(idx.is_default);
    }

    #[test]
    fn deleting_default_index_reassigns_to_sibling() {
        let store = CatalogStore::open_in_memory().unwrap();
        let version_id = setup_version(&store);
        let first = store
            .with_tx(|tx| {
                create(
                    tx,
                    version_id,
                    "first",
                    ValueKind::Dense,
                    Metric::L2,
                    4,
                    HnswConfig::default(),
                    QuantConfig::None,
                    false,
                )
            })
            .unwrap();
        let second = store
            .with_tx(|tx| {
                create(
                    tx,
                    version_id,
                    "second",
                    ValueKind::Dense,
                    Metric::L2,
                    4,
                    HnswConfig::default(),
                    QuantConfig::None,
                    true,
                )
            })
            .unwrap();
        assert!(second.is_default);
        store.with_tx(|tx| delete(tx, second.id)).unwrap();
        let default = store.with_conn(|c| get_default(c, version_id)).unwrap();
        assert_eq!(default.id, first.id);
    }

    #[test]
    fn deleting_default_promotes_most_recently_created_sibling() {
        let store = CatalogStore::open_in_memory().unwrap();
        let version_id = setup_version(&store);
        let first = store
            .with_tx(|tx| {
                create(
                    tx,
                    version_id,
                    "first",
                    ValueKind::Dense,
                    Metric::L2,
                    4,
                    HnswConfig::default(),
                    QuantConfig::None,
                    false,
                )
            })
            .unwrap();
        let second = store
            .with_tx(|tx| {
                create(
                    tx,
                    version_id,
                    "second",
                    ValueKind::Dense,
                    Metric::L2,
                    4,
                    HnswConfig::default(),
                    QuantConfig::None,
                    false,
                )
            })
            .unwrap();
        let third = store
            .with_tx(|tx| {
                create(
                    tx,
                    version_id,
                    "third",
                    ValueKind::Dense,
                    Metric::L2,
                    4,
                    HnswConfig::default(),
                    QuantConfig::None,
                    true,
                )
            })
            .unwrap();
        assert!(third.is_default);
        store.with_tx(|tx| delete(tx, third.id)).unwrap();
        // the most-recently-created remaining sibling (second) becomes default,
        // not the oldest (first).
        let default = store.with_conn(|c| get_default(c, version_id)).unwrap();
        assert_eq!(default.id, second.id);
        assert_ne!(default.id, first.id);
    }
}
