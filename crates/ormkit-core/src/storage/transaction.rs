//! Buffered transactions over the sled backend.

use std::collections::BTreeMap;

use sled::transaction::{TransactionError, TransactionResult};

use ormkit_proto::{matches_all, BackendError, Outcome, Row, Statement, TableDef};

use super::engine::{corrupt, unavailable, SledBackend};
use super::key::row_key;
use super::BackendTransaction;

/// A transaction that buffers writes until commit.
///
/// Reads overlay the buffered writes on committed rows, so statements see
/// the transaction's own inserts, updates and deletes. Nothing reaches sled
/// before [`BackendTransaction::commit`], which applies the buffer in one
/// sled transaction.
pub struct SledTransaction<'a> {
    backend: &'a SledBackend,
    /// Pending writes: `Some` for an insert or update, `None` for a delete.
    writes: BTreeMap<(String, u64), Option<Row>>,
}

impl<'a> SledTransaction<'a> {
    /// Create a new transaction.
    pub(crate) fn new(backend: &'a SledBackend) -> Self {
        Self {
            backend,
            writes: BTreeMap::new(),
        }
    }

    /// Read a row, preferring this transaction's writes.
    fn read(&self, table: &str, id: u64) -> Result<Option<Row>, BackendError> {
        if let Some(cached) = self.writes.get(&(table.to_string(), id)) {
            return Ok(cached.clone());
        }
        self.backend.fetch(table, id)
    }

    /// All rows of a table as this transaction sees them, in identifier order.
    fn scan(&self, table: &str) -> Result<Vec<Row>, BackendError> {
        let mut rows: BTreeMap<u64, Row> = self
            .backend
            .scan(table)?
            .into_iter()
            .map(|row| (row.id, row))
            .collect();

        let range = (table.to_string(), 0)..=(table.to_string(), u64::MAX);
        for ((_, id), write) in self.writes.range(range) {
            match write {
                Some(row) => {
                    rows.insert(*id, row.clone());
                }
                None => {
                    rows.remove(id);
                }
            }
        }

        Ok(rows.into_values().collect())
    }

    fn buffer(&mut self, table: &str, id: u64, row: Option<Row>) {
        self.writes.insert((table.to_string(), id), row);
    }

    /// Check the unique columns of every buffered row against the rows the
    /// commit would leave behind.
    fn check_unique(&self) -> Result<(), BackendError> {
        let mut views: BTreeMap<&str, (TableDef, Vec<Row>)> = BTreeMap::new();

        for ((table, id), write) in &self.writes {
            let Some(row) = write else { continue };
            if !views.contains_key(table.as_str()) {
                let def = self.backend.table(table)?;
                let rows = self.scan(table)?;
                views.insert(table.as_str(), (def, rows));
            }
            let Some((def, rows)) = views.get(table.as_str()) else {
                continue;
            };

            for column in def.unique_columns() {
                let Some(value) = row.get(&column.name).filter(|v| !v.is_null()) else {
                    continue;
                };
                let duplicate = rows
                    .iter()
                    .any(|other| other.id != *id && other.get(&column.name) == Some(value));
                if duplicate {
                    return Err(BackendError::UniqueViolation {
                        table: table.clone(),
                        column: column.name.clone(),
                        value: value.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

impl BackendTransaction for SledTransaction<'_> {
    fn execute(&mut self, statement: &Statement) -> Result<Outcome, BackendError> {
        let table = statement.table();
        self.backend.table(table)?;

        match statement {
            Statement::Insert { values, .. } => {
                let id = self.backend.next_id(table)?;
                self.buffer(table, id, Some(Row::new(id, values.clone())));
                Ok(Outcome::Inserted(id))
            }
            Statement::Update { id, values, .. } => {
                if self.read(table, *id)?.is_none() {
                    return Ok(Outcome::Affected(0));
                }
                self.buffer(table, *id, Some(Row::new(*id, values.clone())));
                Ok(Outcome::Affected(1))
            }
            Statement::Delete { id, .. } => {
                if self.read(table, *id)?.is_none() {
                    return Ok(Outcome::Affected(0));
                }
                self.buffer(table, *id, None);
                Ok(Outcome::Affected(1))
            }
            Statement::Fetch { id, .. } => {
                Ok(Outcome::Rows(self.read(table, *id)?.into_iter().collect()))
            }
            Statement::DeleteAll { .. } => {
                let rows = self.scan(table)?;
                for row in &rows {
                    self.buffer(table, row.id, None);
                }
                Ok(Outcome::Affected(rows.len()))
            }
            Statement::Select {
                criteria,
                projection,
                ..
            } => {
                let rows = self
                    .scan(table)?
                    .into_iter()
                    .filter(|row| matches_all(criteria, row))
                    .map(|row| match projection {
                        Some(column) => row.project(column),
                        None => row,
                    })
                    .collect();
                Ok(Outcome::Rows(rows))
            }
        }
    }

    fn commit(self: Box<Self>) -> Result<(), BackendError> {
        if self.writes.is_empty() {
            return Ok(());
        }

        let _guard = self.backend.lock_commits();
        self.check_unique()?;

        let mut encoded = Vec::with_capacity(self.writes.len());
        for ((table, id), write) in &self.writes {
            let bytes = match write {
                Some(row) => Some(row.to_bytes().map_err(corrupt)?),
                None => None,
            };
            encoded.push((row_key(table, *id), bytes));
        }

        let result: TransactionResult<(), BackendError> =
            self.backend.rows_tree().transaction(|tx| {
                for (key, bytes) in &encoded {
                    match bytes {
                        Some(bytes) => {
                            tx.insert(key.as_slice(), bytes.as_slice())?;
                        }
                        None => {
                            tx.remove(key.as_slice())?;
                        }
                    }
                }
                Ok(())
            });

        match result {
            Ok(()) => {}
            Err(TransactionError::Abort(e)) => return Err(e),
            Err(TransactionError::Storage(e)) => return Err(unavailable(e)),
        }

        if self.backend.sync_commits() {
            self.backend.flush()?;
        }

        tracing::debug!(writes = encoded.len(), "transaction committed");
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), BackendError> {
        tracing::debug!(discarded = self.writes.len(), "transaction rolled back");
        Ok(())
    }
}
