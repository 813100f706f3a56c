//! Backing store boundary and the sled implementation behind it.
//!
//! The mapping core only speaks [`Statement`]s through these traits. Any
//! store that can create tables, hand out identifiers and run
//! insert/update/delete/select inside a transaction can sit behind them.

mod config;
mod engine;
mod key;
mod transaction;

pub use config::StorageConfig;
pub use engine::SledBackend;
pub use transaction::SledTransaction;

use ormkit_proto::{BackendError, Outcome, Statement, TableDef};

/// A relational store reachable through parameterized statements.
pub trait Backend: Send + Sync {
    /// Create the table if it does not exist.
    ///
    /// Calling this again with an identical definition is a no-op; a
    /// different definition under the same name is a `TableMismatch`.
    fn ensure_table(&self, table: &TableDef) -> Result<(), BackendError>;

    /// Start a transaction.
    fn begin(&self) -> Result<Box<dyn BackendTransaction + '_>, BackendError>;
}

/// An open transaction. Dropping it without committing discards its writes.
pub trait BackendTransaction {
    /// Execute one statement. Reads observe this transaction's own writes.
    fn execute(&mut self, statement: &Statement) -> Result<Outcome, BackendError>;

    /// Make all writes durable and visible to other transactions.
    fn commit(self: Box<Self>) -> Result<(), BackendError>;

    /// Discard all writes.
    fn rollback(self: Box<Self>) -> Result<(), BackendError>;
}
