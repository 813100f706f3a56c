//! Statements executed against the backing store, and their outcomes.

use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::Error;
use crate::value::Value;

/// A stored row: the generated identifier plus column values.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Row {
    /// Store-generated identifier.
    pub id: u64,
    /// Column name/value pairs.
    pub values: Vec<(String, Value)>,
}

impl Row {
    /// Create a row.
    pub fn new(id: u64, values: Vec<(String, Value)>) -> Self {
        Self { id, values }
    }

    /// Get a column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Keep only the named column.
    pub fn project(self, column: &str) -> Row {
        let values = self
            .values
            .into_iter()
            .filter(|(name, _)| name == column)
            .collect();
        Row { id: self.id, values }
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

/// An equality predicate on one column.
///
/// Comparing against `Value::Null` matches rows whose column is null.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// Storage column name.
    pub column: String,
    /// Value the column must equal.
    pub value: Value,
}

impl Clause {
    /// Create an equality clause.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Evaluate against a row. Missing columns read as null.
    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column).unwrap_or(&Value::Null) == &self.value
    }
}

/// Check a row against AND-combined clauses.
pub fn matches_all(clauses: &[Clause], row: &Row) -> bool {
    clauses.iter().all(|clause| clause.matches(row))
}

/// A parameterized statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Insert a new row; the store generates the identifier.
    Insert {
        /// Table name.
        table: String,
        /// Column values.
        values: Vec<(String, Value)>,
    },
    /// Replace all column values of an existing row.
    Update {
        /// Table name.
        table: String,
        /// Row identifier.
        id: u64,
        /// Column values.
        values: Vec<(String, Value)>,
    },
    /// Delete one row.
    Delete {
        /// Table name.
        table: String,
        /// Row identifier.
        id: u64,
    },
    /// Read one row by identifier.
    Fetch {
        /// Table name.
        table: String,
        /// Row identifier.
        id: u64,
    },
    /// Delete every row of a table.
    DeleteAll {
        /// Table name.
        table: String,
    },
    /// Read rows matching all clauses, in identifier order.
    Select {
        /// Table name.
        table: String,
        /// AND-combined predicates.
        criteria: Vec<Clause>,
        /// Return only this column when set.
        projection: Option<String>,
    },
}

impl Statement {
    /// Table the statement targets.
    pub fn table(&self) -> &str {
        match self {
            Statement::Insert { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. }
            | Statement::Fetch { table, .. }
            | Statement::DeleteAll { table }
            | Statement::Select { table, .. } => table,
        }
    }

    /// Create a select over a whole table.
    pub fn select_all(table: impl Into<String>) -> Self {
        Statement::Select {
            table: table.into(),
            criteria: Vec::new(),
            projection: None,
        }
    }
}

fn write_assignments(f: &mut fmt::Formatter<'_>, values: &[(String, Value)]) -> fmt::Result {
    for (i, (column, value)) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{column} = {value}")?;
    }
    Ok(())
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Insert { table, values } => {
                write!(f, "INSERT INTO {table} SET ")?;
                write_assignments(f, values)
            }
            Statement::Update { table, id, values } => {
                write!(f, "UPDATE {table} SET ")?;
                write_assignments(f, values)?;
                write!(f, " WHERE id = {id}")
            }
            Statement::Delete { table, id } => write!(f, "DELETE FROM {table} WHERE id = {id}"),
            Statement::Fetch { table, id } => write!(f, "SELECT * FROM {table} WHERE id = {id}"),
            Statement::DeleteAll { table } => write!(f, "DELETE FROM {table}"),
            Statement::Select {
                table,
                criteria,
                projection,
            } => {
                let shape = projection.as_deref().unwrap_or("*");
                write!(f, "SELECT {shape} FROM {table}")?;
                for (i, clause) in criteria.iter().enumerate() {
                    let joiner = if i == 0 { " WHERE" } else { " AND" };
                    write!(f, "{joiner} {} = {}", clause.column, clause.value)?;
                }
                Ok(())
            }
        }
    }
}

/// Result of executing a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// An insert succeeded with this generated identifier.
    Inserted(u64),
    /// Number of rows changed by an update or delete.
    Affected(usize),
    /// Rows returned by a select.
    Rows(Vec<Row>),
}

impl Outcome {
    /// The generated identifier of an insert.
    pub fn inserted_id(&self) -> Option<u64> {
        match self {
            Outcome::Inserted(id) => Some(*id),
            _ => None,
        }
    }

    /// The affected row count of a write.
    pub fn affected(&self) -> usize {
        match self {
            Outcome::Inserted(_) => 1,
            Outcome::Affected(n) => *n,
            Outcome::Rows(_) => 0,
        }
    }

    /// The rows of a select; writes yield none.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Outcome::Rows(rows) => rows,
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_row() -> Row {
        Row::new(
            1,
            vec![
                ("firstName".into(), Value::from("Hans")),
                ("lastName".into(), Value::from("Wurst")),
                ("resume".into(), Value::Null),
            ],
        )
    }

    #[test]
    fn test_clause_matching() {
        let row = person_row();
        assert!(Clause::eq("lastName", "Wurst").matches(&row));
        assert!(!Clause::eq("lastName", "Brot").matches(&row));
        assert!(Clause::eq("resume", Value::Null).matches(&row));
        assert!(Clause::eq("missing", Value::Null).matches(&row));

        let both = [Clause::eq("lastName", "Wurst"), Clause::eq("firstName", "Hans")];
        assert!(matches_all(&both, &row));
        assert!(matches_all(&[], &row));
    }

    #[test]
    fn test_row_projection() {
        let projected = person_row().project("lastName");
        assert_eq!(projected.id, 1);
        assert_eq!(projected.values.len(), 1);
        assert_eq!(projected.get("lastName"), Some(&Value::from("Wurst")));
    }

    #[test]
    fn test_statement_display() {
        let select = Statement::Select {
            table: "Person".into(),
            criteria: vec![Clause::eq("lastName", "Wurst"), Clause::eq("firstName", "Hans")],
            projection: Some("resume".into()),
        };
        assert_eq!(
            select.to_string(),
            "SELECT resume FROM Person WHERE lastName = 'Wurst' AND firstName = 'Hans'"
        );
        assert_eq!(
            Statement::Delete {
                table: "Person".into(),
                id: 7
            }
            .to_string(),
            "DELETE FROM Person WHERE id = 7"
        );
    }

    #[test]
    fn test_outcome_accessors() {
        assert_eq!(Outcome::Inserted(3).inserted_id(), Some(3));
        assert_eq!(Outcome::Affected(0).affected(), 0);
        assert!(Outcome::Affected(2).into_rows().is_empty());
    }
}
