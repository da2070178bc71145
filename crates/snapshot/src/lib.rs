//! Archive create/restore over the catalog store.
//!
//! Grounded in `vdb-storage::CatalogStore::backup_to_file`/`restore_from_file`
//! (SQLite's online backup API) for the database copy, and the convention of
//! keeping all durable-format details in one place for `manifest.json`'s
//! shape.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vdb_catalog::{snapshot as snapshot_row, Catalog};
use vdb_core::{now_utc, Error, Result, UniqueId};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

const SCHEMA_VERSION: u32 = 1;

/// One `(space, version_unique_id)` pair a snapshot selects. `version_unique_id
/// = None` means "the space's default version at creation time", resolved to
/// a concrete id before being recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectionEntry {
    pub space: String,
    pub version_unique_id: UniqueId,
}

/// `manifest.json`'s shape. Informational only during restore — the backup
/// file's own embedded timestamp is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub schema_version: u32,
    pub created_utc: i64,
    pub selection: Vec<SelectionEntry>,
}

fn backup_file_name(created_utc: i64) -> String {
    format!("backup_{created_utc}.db")
}

/// Back up the catalog store, record which `(space, version_unique_id)`
/// selection it covers, and bundle the result into a ZIP at `file`.
pub fn create(catalog: &Catalog, selection: &[(String, Option<UniqueId>)], file: &Path, staging_dir: &Path) -> Result<()> {
    fs::create_dir_all(staging_dir)?;
    catalog.flush_loaded_indexes()?;

    let mut resolved = Vec::with_capacity(selection.len());
    for (space, version_unique_id) in selection {
        let version = catalog.resolve_version(space, *version_unique_id)?;
        resolved.push(SelectionEntry {
            space: space.clone(),
            version_unique_id: version.unique_id,
        });
    }

    let created_utc = now_utc();
    let backup_name = backup_file_name(created_utc);
    let backup_path = staging_dir.join(&backup_name);
    catalog.store().backup_to_file(&backup_path)?;

    let manifest = Manifest {
        schema_version: SCHEMA_VERSION,
        created_utc,
        selection: resolved,
    };
    let manifest_path = staging_dir.join("manifest.json");
    fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)?;

    write_zip(file, &[manifest_path, backup_path])?;

    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::BadRequest(format!("snapshot path has no file name: {}", file.display())))?;
    let request_json = serde_json::to_string(&manifest)?;
    catalog.store().with_tx(|tx| snapshot_row::create(tx, &request_json, file_name))?;
    Ok(())
}

fn write_zip(dest: &Path, entries: &[PathBuf]) -> Result<()> {
    let zip_file = File::create(dest)?;
    let mut writer = ZipWriter::new(zip_file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for entry in entries {
        let name = entry
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Internal(format!("archive entry has no file name: {}", entry.display())))?;
        writer.start_file(name, options).map_err(|e| Error::Storage(e.to_string()))?;
        let mut bytes = Vec::new();
        File::open(entry)?.read_to_end(&mut bytes)?;
        writer.write_all(&bytes)?;
    }
    writer.finish().map_err(|e| Error::Storage(e.to_string()))?;
    Ok(())
}

/// Parse the timestamp embedded in a `backup_<ts>.db` file name.
fn parse_backup_timestamp(name: &str) -> Option<i64> {
    name.strip_prefix("backup_")?.strip_suffix(".db")?.parse().ok()
}

/// Invalidate every cache, unzip `zip_path` into `target_dir`, and restore the
/// live store from the newest `backup_*.db` found there.
pub fn restore(catalog: &Catalog, zip_path: &Path, target_dir: &Path) -> Result<()> {
    catalog.invalidate_all_caches();
    fs::create_dir_all(target_dir)?;

    let archive_file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(archive_file).map_err(|e| Error::Storage(e.to_string()))?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| Error::Storage(e.to_string()))?;
        let out_path = target_dir.join(entry.name());
        if entry.name().ends_with('/') {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out_file)?;
    }

    let newest = fs::read_dir(target_dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().into_string().ok()?;
            let ts = parse_backup_timestamp(&name)?;
            Some((ts, e.path()))
        })
        .max_by_key(|(ts, _)| *ts)
        .map(|(_, path)| path)
        .ok_or_else(|| Error::NotFound(format!("no backup_*.db found in {}", target_dir.display())))?;

    catalog.store().restore_from_file(&newest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdb_core::{HnswConfig, Metric, QuantConfig, ValueKind, VectorPayload};

    fn seeded_catalog(dir: &Path) -> Catalog {
        let cfg = vdb_core::Config::in_memory(dir.to_path_buf());
        let catalog = Catalog::open(&cfg).unwrap();
        catalog.create_space("S", None, &[]).unwrap();
        catalog
            .create_index(
                "S", None, "primary", ValueKind::Dense, Metric::L2, 4,
                HnswConfig::default(), QuantConfig::None, false,
            )
            .unwrap();
        catalog
            .upsert_vector("S", None, None, Some(1), VectorPayload::Dense(vec![1.0, 0.0, 0.0, 0.0]), &[])
            .unwrap();
        catalog
    }

    #[test]
    fn create_then_restore_preserves_search_results() {
        let data_dir = tempfile::tempdir().unwrap();
        let staging_dir = tempfile::tempdir().unwrap();
        let catalog = seeded_catalog(data_dir.path());
        let zip_path = staging_dir.path().join("snap.zip");

        create(&catalog, &[("S".to_string(), None)], &zip_path, staging_dir.path()).unwrap();

        catalog
            .upsert_vector("S", None, None, Some(2), VectorPayload::Dense(vec![0.0, 1.0, 0.0, 0.0]), &[])
            .unwrap();
        assert_eq!(catalog.list_spaces().unwrap().len(), 1);

        let restore_dir = tempfile::tempdir().unwrap();
        restore(&catalog, &zip_path, restore_dir.path()).unwrap();

        let hits = catalog
            .search("S", None, None, &VectorPayload::Dense(vec![1.0, 0.0, 0.0, 0.0]), 10)
            .unwrap();
        assert_eq!(hits.iter().filter(|h| h.unique_id == 2).count(), 0);
        assert_eq!(hits.iter().filter(|h| h.unique_id == 1).count(), 1);
    }

    #[test]
    fn manifest_records_resolved_default_version() {
        let data_dir = tempfile::tempdir().unwrap();
        let staging_dir = tempfile::tempdir().unwrap();
        let catalog = seeded_catalog(data_dir.path());
        let zip_path = staging_dir.path().join("snap.zip");
        create(&catalog, &[("S".to_string(), None)], &zip_path, staging_dir.path()).unwrap();

        let manifest_bytes = fs::read(staging_dir.path().join("manifest.json")).unwrap();
        let manifest: Manifest = serde_json::from_slice(&manifest_bytes).unwrap();
        assert_eq!(manifest.selection, vec![SelectionEntry { space: "S".to_string(), version_unique_id: 1 }]);
    }

    #[test]
    fn newest_backup_wins_when_multiple_present() {
        assert_eq!(parse_backup_timestamp("backup_100.db"), Some(100));
        assert_eq!(parse_backup_timestamp("backup_bad.db"), None);
        assert_eq!(parse_backup_timestamp("manifest.json"), None);
    }
}
