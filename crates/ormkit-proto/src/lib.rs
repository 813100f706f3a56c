//! ormkit protocol types.
//!
//! This crate defines the boundary between the mapping core and the
//! relational store behind it: runtime values, table definitions,
//! statements and their outcomes. Persisted types derive rkyv
//! `Archive`, `Serialize` and `Deserialize`.
//!
//! # Modules
//!
//! - [`value`] - Runtime values and declared value kinds
//! - [`table`] - Table and column definitions
//! - [`statement`] - Statements, predicates, rows and outcomes
//! - [`error`] - Protocol and backend error types

pub mod error;
pub mod statement;
pub mod table;
pub mod value;

pub use error::{BackendError, Error};
pub use statement::{matches_all, Clause, Outcome, Row, Statement};
pub use table::{ColumnDef, TableDef};
pub use value::{Value, ValueKind};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_roundtrip() {
        let row = Row::new(
            42,
            vec![
                ("firstName".into(), Value::from("Hans")),
                ("birthDate".into(), Value::Timestamp(123_456_789_000)),
                ("resume".into(), Value::Null),
            ],
        );
        let decoded = Row::from_bytes(&row.to_bytes().unwrap()).unwrap();
        assert_eq!(row, decoded);
    }

    #[test]
    fn test_corrupt_row_is_rejected() {
        assert!(Row::from_bytes(&[1, 2, 3]).is_err());
    }
}
