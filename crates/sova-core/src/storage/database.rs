//! SQLite-backed dataset store
//!
//! Holds the reconciled dataset: feature definitions, subspaces and the
//! object table whose columns are created per feature at import time.
//!
//! ## Tables
//!
//! - `metadata` - Schema version stamp
//! - `features` - One row per feature with observed extrema
//! - `subspaces` - One row per (subspace, feature reference)
//! - `objects` - One REAL column per feature, named by feature id
//!
//! SQLite binds NaN as NULL. Every reader maps NULL back to NaN.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::{params, params_from_iter, Connection, Transaction};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::{bounded_name, Feature, ObjectBatch, Subspace};
use crate::selection::Selection;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema::{
    drop_data_tables, feature_column, get_schema_version, init_schema, object_columns,
    SCHEMA_VERSION,
};

/// Oldest SQLite library the schema is known to work with
pub const MIN_SQLITE_VERSION: i32 = 3_008_002;

/// Summary of what a store currently holds
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoreStats {
    pub schema_version: i32,
    pub features: usize,
    pub outlier_features: usize,
    pub subspaces: usize,
    pub objects: u64,
}

/// A single-writer session on a dataset store
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open or create the store at `path`
    ///
    /// A fresh file gets the full schema and the current version stamp.
    /// An existing store must carry exactly [`SCHEMA_VERSION`].
    pub fn open(path: &Path) -> StorageResult<Self> {
        check_driver()?;

        let conn = Connection::open(path).map_err(|source| StorageError::ConnectionFailed {
            path: path.to_path_buf(),
            source,
        })?;

        let db = Self::prepare(conn, Some(path.to_path_buf()))?;
        info!("Opened store at {:?}", path);
        Ok(db)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        check_driver()?;

        let conn = Connection::open_in_memory().map_err(|source| {
            StorageError::ConnectionFailed {
                path: PathBuf::from(":memory:"),
                source,
            }
        })?;

        Self::prepare(conn, None)
    }

    fn prepare(conn: Connection, path: Option<PathBuf>) -> StorageResult<Self> {
        tune_connection(&conn).map_err(StorageError::ConfigFailed)?;

        match get_schema_version(&conn).map_err(StorageError::ReadFailed)? {
            None => {
                init_schema(&conn).map_err(StorageError::WriteFailed)?;
                debug!("Created store schema v{}", SCHEMA_VERSION);
            }
            Some(version) if version == SCHEMA_VERSION => {}
            Some(found) => {
                return Err(StorageError::IncompatibleVersion {
                    found,
                    expected: SCHEMA_VERSION,
                });
            }
        }

        Ok(Self { conn, path })
    }

    /// Location of the store file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check whether no features have been defined yet
    ///
    /// Read failures count as empty.
    pub fn is_empty(&self) -> bool {
        match self
            .conn
            .query_row("SELECT COUNT(*) FROM features", [], |row| row.get::<_, i64>(0))
        {
            Ok(count) => count == 0,
            Err(e) => {
                warn!("Could not count features, treating store as empty: {}", e);
                true
            }
        }
    }

    /// Drop every feature, subspace and object and recreate the schema
    pub fn reset(&mut self) -> StorageResult<()> {
        let tx = self.conn.transaction().map_err(StorageError::WriteFailed)?;
        drop_data_tables(&tx).map_err(StorageError::WriteFailed)?;
        init_schema(&tx).map_err(StorageError::WriteFailed)?;
        tx.commit().map_err(StorageError::WriteFailed)?;

        debug!("Store reset");
        Ok(())
    }

    // ==================== Write Methods ====================

    /// Register features and their object columns
    ///
    /// Feature `i` (0-based) gets id `i + 1` and a column of the same
    /// name. Existing columns are kept, so repeating a definition is a
    /// no-op apart from resetting the extrema placeholders.
    pub fn define_features(&mut self, names: &[String], outlier_flags: &[bool]) -> StorageResult<()> {
        let tx = self.conn.transaction().map_err(StorageError::WriteFailed)?;
        define_features_tx(&tx, names, outlier_flags).map_err(StorageError::WriteFailed)?;
        tx.commit().map_err(StorageError::WriteFailed)?;

        debug!("Defined {} features", names.len());
        Ok(())
    }

    /// Append every buffered row as one transaction
    pub fn push_objects(&mut self, batch: &ObjectBatch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction().map_err(StorageError::WriteFailed)?;
        insert_objects(&tx, batch).map_err(StorageError::WriteFailed)?;
        tx.commit().map_err(StorageError::WriteFailed)?;

        debug!("Flushed batch of {} objects", batch.len());
        Ok(())
    }

    /// Append one subspace, one row per feature reference
    pub fn push_subspace(&mut self, id: i64, feature_refs: &[i64], name: &str) -> StorageResult<()> {
        let tx = self.conn.transaction().map_err(StorageError::WriteFailed)?;
        insert_subspace(&tx, id, feature_refs, name).map_err(StorageError::WriteFailed)?;
        tx.commit().map_err(StorageError::WriteFailed)?;

        debug!("Stored subspace {} over {:?}", id, feature_refs);
        Ok(())
    }

    /// Scan every feature column and store its observed min and max
    ///
    /// Columns without any value keep their previous extrema.
    pub fn recompute_feature_extrema(&mut self) -> StorageResult<()> {
        let tx = self.conn.transaction().map_err(StorageError::WriteFailed)?;
        update_extrema(&tx).map_err(StorageError::WriteFailed)?;
        tx.commit().map_err(StorageError::WriteFailed)?;
        Ok(())
    }

    // ==================== Query Methods ====================

    /// Get all features ordered by id
    pub fn features(&self) -> StorageResult<Vec<Feature>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, is_outlier, is_virtual, min_value, max_value FROM features ORDER BY id",
            )
            .map_err(StorageError::ReadFailed)?;

        let features = stmt
            .query_map([], |row| {
                Ok(Feature {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    is_outlier: row.get(2)?,
                    is_virtual: row.get(3)?,
                    min_value: row.get::<_, Option<f64>>(4)?.unwrap_or(f64::NAN),
                    max_value: row.get::<_, Option<f64>>(5)?.unwrap_or(f64::NAN),
                })
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(StorageError::ReadFailed)?;

        Ok(features)
    }

    /// Get all subspaces ordered by id, feature references in stored order
    pub fn subspaces(&self) -> StorageResult<Vec<Subspace>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, feature_ref, name FROM subspaces ORDER BY id, position")
            .map_err(StorageError::ReadFailed)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(StorageError::ReadFailed)?;

        let mut subspaces: Vec<Subspace> = Vec::new();
        for (id, feature_ref, name) in rows {
            match subspaces.last_mut() {
                Some(last) if last.id == id => last.feature_refs.push(feature_ref),
                _ => subspaces.push(Subspace {
                    id,
                    feature_refs: vec![feature_ref],
                    name,
                }),
            }
        }

        Ok(subspaces)
    }

    /// Get the number of stored objects
    pub fn object_count(&self) -> StorageResult<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM objects", [], |row| row.get::<_, i64>(0))
            .map(|count| count.max(0) as u64)
            .map_err(StorageError::ReadFailed)
    }

    /// Stream objects in id order
    ///
    /// `f` receives the object's 0-based position and its values ordered
    /// by feature id. With a selection, only selected positions are
    /// visited. Returns the number of visited objects.
    pub fn for_each_object<E, F>(&self, selection: Option<&Selection>, mut f: F) -> Result<usize, E>
    where
        E: From<StorageError>,
        F: FnMut(usize, &[f64]) -> Result<(), E>,
    {
        let feature_ids = self.feature_ids().map_err(E::from)?;
        let mut columns = vec!["id".to_string()];
        columns.extend(feature_ids.iter().map(|id| feature_column(*id)));

        let sql = format!("SELECT {} FROM objects ORDER BY id", columns.join(", "));
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| E::from(StorageError::ReadFailed(e)))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| E::from(StorageError::ReadFailed(e)))?;

        let mut values = Vec::with_capacity(feature_ids.len());
        let mut position = 0;
        let mut visited = 0;

        while let Some(row) = rows
            .next()
            .map_err(|e| E::from(StorageError::ReadFailed(e)))?
        {
            let current = position;
            position += 1;

            if selection.is_some_and(|s| !s.contains(current)) {
                continue;
            }

            values.clear();
            for column in 1..=feature_ids.len() {
                let value: Option<f64> = row
                    .get(column)
                    .map_err(|e| E::from(StorageError::ReadFailed(e)))?;
                values.push(value.unwrap_or(f64::NAN));
            }

            f(current, &values)?;
            visited += 1;
        }

        Ok(visited)
    }

    /// Collect objects into memory
    pub fn objects(&self, selection: Option<&Selection>) -> StorageResult<Vec<Vec<f64>>> {
        let mut objects = Vec::new();
        self.for_each_object::<StorageError, _>(selection, |_, values| {
            objects.push(values.to_vec());
            Ok(())
        })?;
        Ok(objects)
    }

    /// Get store statistics
    pub fn stats(&self) -> StorageResult<StoreStats> {
        let features = self.features()?;
        let subspaces: i64 = self
            .conn
            .query_row("SELECT COUNT(DISTINCT id) FROM subspaces", [], |row| row.get(0))
            .map_err(StorageError::ReadFailed)?;

        Ok(StoreStats {
            schema_version: SCHEMA_VERSION,
            outlier_features: features.iter().filter(|f| f.is_outlier).count(),
            features: features.len(),
            subspaces: subspaces.max(0) as usize,
            objects: self.object_count()?,
        })
    }

    /// Release the connection
    pub fn close(self) -> StorageResult<()> {
        self.conn
            .close()
            .map_err(|(_, e)| StorageError::WriteFailed(e))
    }

    // ==================== Private helpers ====================

    fn feature_ids(&self) -> StorageResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM features ORDER BY id")
            .map_err(StorageError::ReadFailed)?;
        let ids = stmt
            .query_map([], |row| row.get(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<i64>>>())
            .map_err(StorageError::ReadFailed)?;
        Ok(ids)
    }
}

/// Refuse SQLite libraries older than the schema needs
fn check_driver() -> StorageResult<()> {
    if rusqlite::version_number() < MIN_SQLITE_VERSION {
        return Err(StorageError::DriverUnavailable {
            found: rusqlite::version().to_string(),
            required: "3.8.2".to_string(),
        });
    }
    Ok(())
}

/// Single-writer throughput settings applied after every open
fn tune_connection(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode answers with the mode now in effect
    let _: String =
        conn.pragma_update_and_check(None, "journal_mode", "MEMORY", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "OFF")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "cache_size", -16000)?;
    Ok(())
}

// ==================== Transaction helpers ====================

fn define_features_tx(
    tx: &Transaction,
    names: &[String],
    outlier_flags: &[bool],
) -> rusqlite::Result<()> {
    let existing: HashSet<String> = object_columns(tx)?.into_iter().collect();

    for i in 0..names.len() {
        let id = (i + 1) as i64;
        if !existing.contains(&id.to_string()) {
            tx.execute_batch(&format!(
                "ALTER TABLE objects ADD COLUMN {} REAL",
                feature_column(id)
            ))?;
        }
    }

    let mut stmt = tx.prepare(
        r#"
        INSERT OR REPLACE INTO features (id, name, is_outlier, is_virtual, min_value, max_value)
        VALUES (?, ?, ?, ?, 0.0, 1.0)
        "#,
    )?;

    for (i, name) in names.iter().enumerate() {
        let is_outlier = outlier_flags.get(i).copied().unwrap_or(false);
        // Synthetic score columns are derived, never edited
        stmt.execute(params![(i + 1) as i64, bounded_name(name), is_outlier, is_outlier])?;
    }

    Ok(())
}

fn insert_objects(tx: &Transaction, batch: &ObjectBatch) -> rusqlite::Result<()> {
    let width = batch.width();
    let columns: Vec<String> = (1..=width as i64).map(feature_column).collect();
    let placeholders = vec!["?"; width].join(", ");

    let mut stmt = tx.prepare_cached(&format!(
        "INSERT INTO objects ({}) VALUES ({})",
        columns.join(", "),
        placeholders
    ))?;

    for row in batch.rows() {
        stmt.execute(params_from_iter(row.iter()))?;
    }

    Ok(())
}

fn insert_subspace(
    tx: &Transaction,
    id: i64,
    feature_refs: &[i64],
    name: &str,
) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO subspaces (id, position, feature_ref, name) VALUES (?, ?, ?, ?)",
    )?;

    for (position, feature_ref) in feature_refs.iter().enumerate() {
        stmt.execute(params![id, position as i64, feature_ref, name])?;
    }

    Ok(())
}

fn update_extrema(tx: &Transaction) -> rusqlite::Result<()> {
    let ids: Vec<i64> = tx
        .prepare("SELECT id FROM features ORDER BY id")?
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;

    let mut update = tx.prepare("UPDATE features SET min_value = ?, max_value = ? WHERE id = ?")?;

    for id in ids {
        let column = feature_column(id);
        let (min, max): (Option<f64>, Option<f64>) = tx.query_row(
            &format!("SELECT MIN({column}), MAX({column}) FROM objects"),
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        if let (Some(min), Some(max)) = (min, max) {
            update.execute(params![min, max, id])?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn batch_of(rows: &[&[f64]]) -> ObjectBatch {
        let mut batch = ObjectBatch::new(rows[0].len(), rows.len());
        for row in rows {
            batch.push_row(row);
        }
        batch
    }

    #[test]
    fn test_open_in_memory_is_empty() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.is_empty());
        assert_eq!(db.object_count().unwrap(), 0);
        assert!(db.path().is_none());
    }

    #[test]
    fn test_open_file_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let mut db = Database::open(&path).unwrap();
        db.define_features(&names(&["a", "b"]), &[false, false]).unwrap();
        db.close().unwrap();

        let db = Database::open(&path).unwrap();
        assert!(!db.is_empty());
        assert_eq!(db.features().unwrap().len(), 2);
    }

    #[test]
    fn test_open_rejects_other_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        Database::open(&path).unwrap().close().unwrap();
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("UPDATE metadata SET value = '1' WHERE key = 'version'", [])
                .unwrap();
        }

        let err = Database::open(&path).err().unwrap();
        assert!(matches!(
            err,
            StorageError::IncompatibleVersion {
                found: 1,
                expected: SCHEMA_VERSION
            }
        ));
    }

    #[test]
    fn test_is_empty_treats_read_failure_as_empty() {
        let mut db = Database::open_in_memory().unwrap();
        db.define_features(&names(&["a", "b"]), &[]).unwrap();
        assert!(!db.is_empty());

        db.conn.execute_batch("DROP TABLE features").unwrap();

        assert!(db.is_empty());
        assert!(matches!(db.features(), Err(StorageError::ReadFailed(_))));
    }

    #[test]
    fn test_open_unreadable_version_is_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE metadata (key TEXT PRIMARY KEY)")
                .unwrap();
        }

        let err = Database::open(&path).err().unwrap();
        assert!(matches!(err, StorageError::ReadFailed(_)));
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("store.db");

        let err = Database::open(&path).err().unwrap();
        assert!(matches!(err, StorageError::ConnectionFailed { .. }));
    }

    #[test]
    fn test_define_features_is_idempotent() {
        let mut db = Database::open_in_memory().unwrap();
        let list = names(&["f0", "f1", "Outlierness1"]);

        db.define_features(&list, &[false, false, true]).unwrap();
        db.define_features(&list, &[false, false, true]).unwrap();

        let features = db.features().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[2].name, "Outlierness1");
        assert!(features[2].is_outlier);
        assert!(features[2].is_virtual);
        assert!(!features[0].is_outlier);
        assert_eq!(features[0].min_value, 0.0);
        assert_eq!(features[0].max_value, 1.0);
    }

    #[test]
    fn test_push_objects_and_read_back() {
        let mut db = Database::open_in_memory().unwrap();
        db.define_features(&names(&["a", "b"]), &[]).unwrap();

        db.push_objects(&batch_of(&[&[1.5, 2.5], &[3.5, f64::NAN]])).unwrap();

        let objects = db.objects(None).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0], vec![1.5, 2.5]);
        assert_eq!(objects[1][0], 3.5);
        assert!(objects[1][1].is_nan());
    }

    #[test]
    fn test_selection_restricts_objects() {
        let mut db = Database::open_in_memory().unwrap();
        db.define_features(&names(&["a", "b"]), &[]).unwrap();
        db.push_objects(&batch_of(&[&[1.0, 1.0], &[2.0, 2.0], &[3.0, 3.0]]))
            .unwrap();

        let selection: Selection = vec![0, 2].into_iter().collect();
        let objects = db.objects(Some(&selection)).unwrap();
        assert_eq!(objects, vec![vec![1.0, 1.0], vec![3.0, 3.0]]);
    }

    #[test]
    fn test_push_subspace_round_trip() {
        let mut db = Database::open_in_memory().unwrap();
        db.push_subspace(1, &[3, 1, 2], "a, b").unwrap();
        db.push_subspace(3, &[4, 2], "b").unwrap();

        let subspaces = db.subspaces().unwrap();
        assert_eq!(subspaces.len(), 2);
        assert_eq!(subspaces[0].feature_refs, vec![3, 1, 2]);
        assert_eq!(subspaces[0].name, "a, b");
        assert_eq!(subspaces[1].id, 3);
        assert_eq!(subspaces[1].feature_refs, vec![4, 2]);
    }

    #[test]
    fn test_recompute_extrema_ignores_nan() {
        let mut db = Database::open_in_memory().unwrap();
        db.define_features(&names(&["a", "b", "c"]), &[]).unwrap();
        db.push_objects(&batch_of(&[
            &[-2.0, 10.0, f64::NAN],
            &[4.0, f64::NAN, f64::NAN],
            &[1.0, 5.0, f64::NAN],
        ]))
        .unwrap();

        db.recompute_feature_extrema().unwrap();

        let features = db.features().unwrap();
        assert_eq!((features[0].min_value, features[0].max_value), (-2.0, 4.0));
        assert_eq!((features[1].min_value, features[1].max_value), (5.0, 10.0));
        // No values observed: placeholders stay
        assert_eq!((features[2].min_value, features[2].max_value), (0.0, 1.0));
    }

    #[test]
    fn test_push_objects_without_columns_fails() {
        let mut db = Database::open_in_memory().unwrap();
        let err = db.push_objects(&batch_of(&[&[1.0]])).err().unwrap();
        assert!(matches!(err, StorageError::WriteFailed(_)));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut db = Database::open_in_memory().unwrap();
        db.define_features(&names(&["a", "b"]), &[]).unwrap();
        db.push_objects(&batch_of(&[&[1.0, 2.0]])).unwrap();
        db.push_subspace(1, &[3, 1, 2], "a, b").unwrap();

        db.reset().unwrap();

        assert!(db.is_empty());
        assert_eq!(db.object_count().unwrap(), 0);
        assert!(db.subspaces().unwrap().is_empty());

        // Fewer features than before: no stale columns remain
        db.define_features(&names(&["x"]), &[]).unwrap();
        db.push_objects(&batch_of(&[&[9.0]])).unwrap();
        assert_eq!(db.objects(None).unwrap(), vec![vec![9.0]]);
    }

    #[test]
    fn test_stats() {
        let mut db = Database::open_in_memory().unwrap();
        db.define_features(&names(&["a", "b", "Outlierness1"]), &[false, false, true])
            .unwrap();
        db.push_subspace(1, &[3, 1, 2], "a, b").unwrap();
        db.push_objects(&batch_of(&[&[1.0, 2.0, 0.5]])).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.features, 3);
        assert_eq!(stats.outlier_features, 1);
        assert_eq!(stats.subspaces, 1);
        assert_eq!(stats.objects, 1);
    }
}
