//! Table definitions handed to the backing store.

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::Error;
use crate::value::ValueKind;

/// A column of a mapped table.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Storage column name.
    pub name: String,
    /// Declared value kind.
    pub kind: ValueKind,
    /// Whether null is accepted.
    pub nullable: bool,
    /// Whether values must be distinct across live rows.
    pub unique: bool,
}

impl ColumnDef {
    /// Create a nullable, non-unique column.
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            unique: false,
        }
    }

    /// Mark as not null.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A table definition. Rows are keyed by a store-generated `u64` identifier
/// that is not part of the column list.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    /// Create an empty table definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Add a column.
    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns carrying a unique constraint.
    pub fn unique_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.unique)
    }

    /// Serialize using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_def_builder() {
        let table = TableDef::new("Person")
            .with_column(ColumnDef::new("firstName", ValueKind::String).not_null())
            .with_column(ColumnDef::new("resume", ValueKind::Text).unique());

        assert_eq!(table.columns.len(), 2);
        assert!(!table.column("firstName").unwrap().nullable);
        assert!(table.column("vitae").is_none());

        let unique: Vec<_> = table.unique_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(unique, vec!["resume"]);
    }

    #[test]
    fn test_table_def_bytes() {
        let table = TableDef::new("Person")
            .with_column(ColumnDef::new("birthDate", ValueKind::Timestamp).not_null());
        let decoded = TableDef::from_bytes(&table.to_bytes().unwrap()).unwrap();
        assert_eq!(table, decoded);
    }
}
