//! Sled-backed store.

use std::collections::HashMap;

use parking_lot::{Mutex, MutexGuard, RwLock};
use sled::{Db, Tree};

use ormkit_proto::{BackendError, Row, TableDef};

use super::key::{decode_u64, row_key, table_prefix};
use super::transaction::SledTransaction;
use super::{Backend, BackendTransaction, StorageConfig};

/// Tree name for row data.
const ROWS_TREE: &str = "rows";

/// Tree name for table definitions.
const CATALOG_TREE: &str = "catalog:tables";

/// Tree name for per-table identifier sequences.
const SEQUENCES_TREE: &str = "meta:sequences";

/// Map a sled failure to the transport-level backend error.
pub(crate) fn unavailable(err: sled::Error) -> BackendError {
    BackendError::Unavailable(err.to_string())
}

/// Map a decoding failure.
pub(crate) fn corrupt(err: ormkit_proto::Error) -> BackendError {
    BackendError::Corrupt(err.to_string())
}

/// A relational store on top of sled.
///
/// Rows of all tables share one tree, keyed by table name and identifier.
/// Table definitions are persisted so a reopened database rejects a
/// conflicting redefinition.
pub struct SledBackend {
    /// The underlying sled database.
    db: Db,

    /// Tree for rows.
    rows: Tree,

    /// Tree for rkyv-encoded table definitions.
    catalog: Tree,

    /// Tree for identifier sequences.
    sequences: Tree,

    /// Cached table definitions by name.
    tables: RwLock<HashMap<String, TableDef>>,

    /// Serializes commits so unique re-checks see a stable snapshot.
    commit_lock: Mutex<()>,

    sync_commits: bool,
}

impl SledBackend {
    /// Open or create a store with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, BackendError> {
        let db = config.to_sled_config().open().map_err(unavailable)?;
        let rows = db.open_tree(ROWS_TREE).map_err(unavailable)?;
        let catalog = db.open_tree(CATALOG_TREE).map_err(unavailable)?;
        let sequences = db.open_tree(SEQUENCES_TREE).map_err(unavailable)?;

        let mut tables = HashMap::new();
        for entry in catalog.iter() {
            let (_, bytes) = entry.map_err(unavailable)?;
            let table = TableDef::from_bytes(&bytes).map_err(corrupt)?;
            tables.insert(table.name.clone(), table);
        }

        tracing::info!(
            tables = tables.len(),
            recovered = db.was_recovered(),
            "sled backend opened"
        );

        Ok(Self {
            db,
            rows,
            catalog,
            sequences,
            tables: RwLock::new(tables),
            commit_lock: Mutex::new(()),
            sync_commits: config.sync_commits(),
        })
    }

    /// Check if the database was recovered from a previous run.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<usize, BackendError> {
        self.db.flush().map_err(unavailable)
    }

    /// Names of the created tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of committed rows in a table.
    pub fn row_count(&self, table: &str) -> Result<usize, BackendError> {
        self.table(table)?;
        let mut count = 0;
        for entry in self.rows.scan_prefix(table_prefix(table)) {
            entry.map_err(unavailable)?;
            count += 1;
        }
        Ok(count)
    }

    /// Get a table definition.
    pub(crate) fn table(&self, name: &str) -> Result<TableDef, BackendError> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::UnknownTable(name.to_string()))
    }

    /// Allocate the next identifier of a table. Sequences start at 1 and
    /// are not rolled back.
    pub(crate) fn next_id(&self, table: &str) -> Result<u64, BackendError> {
        let bumped = self
            .sequences
            .update_and_fetch(table.as_bytes(), |old| {
                let next = old.and_then(decode_u64).unwrap_or(0) + 1;
                Some(next.to_be_bytes().to_vec())
            })
            .map_err(unavailable)?;

        bumped
            .as_deref()
            .and_then(decode_u64)
            .ok_or_else(|| BackendError::Corrupt(format!("sequence of '{table}' is unreadable")))
    }

    /// Read a committed row.
    pub(crate) fn fetch(&self, table: &str, id: u64) -> Result<Option<Row>, BackendError> {
        match self.rows.get(row_key(table, id)).map_err(unavailable)? {
            Some(bytes) => Row::from_bytes(&bytes).map(Some).map_err(corrupt),
            None => Ok(None),
        }
    }

    /// Read all committed rows of a table in identifier order.
    pub(crate) fn scan(&self, table: &str) -> Result<Vec<Row>, BackendError> {
        let mut rows = Vec::new();
        for entry in self.rows.scan_prefix(table_prefix(table)) {
            let (_, bytes) = entry.map_err(unavailable)?;
            rows.push(Row::from_bytes(&bytes).map_err(corrupt)?);
        }
        Ok(rows)
    }

    pub(crate) fn rows_tree(&self) -> &Tree {
        &self.rows
    }

    pub(crate) fn lock_commits(&self) -> MutexGuard<'_, ()> {
        self.commit_lock.lock()
    }

    pub(crate) fn sync_commits(&self) -> bool {
        self.sync_commits
    }
}

impl Backend for SledBackend {
    fn ensure_table(&self, table: &TableDef) -> Result<(), BackendError> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.get(&table.name) {
            if existing == table {
                return Ok(());
            }
            return Err(BackendError::TableMismatch {
                table: table.name.clone(),
            });
        }

        let bytes = table.to_bytes().map_err(corrupt)?;
        self.catalog
            .insert(table.name.as_bytes(), bytes)
            .map_err(unavailable)?;
        tables.insert(table.name.clone(), table.clone());

        tracing::info!(table = %table.name, columns = table.columns.len(), "table created");
        Ok(())
    }

    fn begin(&self) -> Result<Box<dyn BackendTransaction + '_>, BackendError> {
        Ok(Box::new(SledTransaction::new(self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormkit_proto::{ColumnDef, ValueKind};

    fn person_table() -> TableDef {
        TableDef::new("Person")
            .with_column(ColumnDef::new("firstName", ValueKind::String).not_null())
            .with_column(ColumnDef::new("resume", ValueKind::Text).unique())
    }

    #[test]
    fn test_ensure_table_is_idempotent() {
        let backend = SledBackend::open(StorageConfig::temporary()).unwrap();
        backend.ensure_table(&person_table()).unwrap();
        backend.ensure_table(&person_table()).unwrap();
        assert_eq!(backend.table_names(), vec!["Person".to_string()]);

        let changed =
            person_table().with_column(ColumnDef::new("age", ValueKind::Integer));
        assert!(matches!(
            backend.ensure_table(&changed),
            Err(BackendError::TableMismatch { .. })
        ));
    }

    #[test]
    fn test_sequences_are_per_table() {
        let backend = SledBackend::open(StorageConfig::temporary()).unwrap();
        assert_eq!(backend.next_id("Person").unwrap(), 1);
        assert_eq!(backend.next_id("Person").unwrap(), 2);
        assert_eq!(backend.next_id("Address").unwrap(), 1);
    }

    #[test]
    fn test_unknown_table() {
        let backend = SledBackend::open(StorageConfig::temporary()).unwrap();
        assert!(matches!(
            backend.row_count("Ghost"),
            Err(BackendError::UnknownTable(_))
        ));
    }

    #[test]
    fn test_catalog_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = SledBackend::open(StorageConfig::new(dir.path())).unwrap();
            backend.ensure_table(&person_table()).unwrap();
            backend.flush().unwrap();
        }
        let backend = SledBackend::open(StorageConfig::new(dir.path())).unwrap();
        assert_eq!(backend.table("Person").unwrap(), person_table());
    }
}
