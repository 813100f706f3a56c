//! Query builder.

use std::sync::Arc;

use ormkit_proto::{Clause, Statement, Value};

use crate::catalog::{FieldDescriptor, Schema};
use crate::entity::EntityRef;
use crate::error::{Error, Result};
use crate::session::Session;

use super::ResultSet;

/// An AND-combined set of equality predicates over one schema.
#[derive(Debug, Clone)]
pub struct Query {
    schema: Arc<Schema>,
    conditions: Vec<(String, Value)>,
}

impl Query {
    /// An empty query matching every row of the schema.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            conditions: Vec::new(),
        }
    }

    /// The queried schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Accumulated `(property, value)` conditions in call order.
    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// Return a new query that additionally requires `property == value`.
    ///
    /// Comparing against null matches rows where the property is null.
    /// Unknown properties are reported when the query is compiled.
    #[must_use]
    pub fn equals(&self, property: impl Into<String>, value: impl Into<Value>) -> Query {
        let mut next = self.clone();
        next.conditions.push((property.into(), value.into()));
        next
    }

    /// Compile into a select statement, optionally projecting one property.
    pub fn compile(&self, projection: Option<&str>) -> Result<Statement> {
        let criteria = self
            .conditions
            .iter()
            .map(|(property, value)| {
                let field = self.field(property)?;
                // A value that cannot take the field's kind is kept as is and matches nothing.
                let value = field.kind.coerce(value).unwrap_or_else(|| value.clone());
                Ok(Clause::eq(field.column.clone(), value))
            })
            .collect::<Result<Vec<_>>>()?;

        let projection = projection
            .map(|property| self.field(property).map(|f| f.column.clone()))
            .transpose()?;

        Ok(Statement::Select {
            table: self.schema.table().to_string(),
            criteria,
            projection,
        })
    }

    /// Execute and hydrate whole instances.
    pub fn select(&self, session: &mut Session<'_>) -> Result<ResultSet<EntityRef>> {
        let statement = self.compile(None)?;
        session.select_entities(&self.schema, &statement)
    }

    /// Execute and return one property's value from each matching row.
    pub fn select_property(
        &self,
        session: &mut Session<'_>,
        property: &str,
    ) -> Result<ResultSet<Value>> {
        let statement = self.compile(Some(property))?;
        let column = self.field(property)?.column.clone();
        let rows = session.select_rows(&statement)?;
        Ok(rows
            .into_iter()
            .map(|row| row.get(&column).cloned().unwrap_or(Value::Null))
            .collect())
    }

    fn field(&self, property: &str) -> Result<&FieldDescriptor> {
        self.schema.field(property).ok_or_else(|| Error::UnknownField {
            schema: self.schema.name().to_string(),
            field: property.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldSpec;

    fn person() -> Arc<Schema> {
        Arc::new(
            Schema::build(
                "Person",
                vec![
                    ("firstName", FieldSpec::new("string").not_null()),
                    ("lastName", FieldSpec::new("string").not_null()),
                    ("weight", FieldSpec::new("double")),
                    ("vitae", FieldSpec::new("text").column("resume").unique()),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_equals_returns_new_query() {
        let base = Query::new(person());
        let narrowed = base.equals("lastName", "Wurst");
        let narrower = narrowed.equals("firstName", "Hans");

        assert!(base.conditions().is_empty());
        assert_eq!(narrowed.conditions().len(), 1);
        assert_eq!(narrower.conditions().len(), 2);
    }

    #[test]
    fn test_compile_maps_columns() {
        let statement = Query::new(person())
            .equals("lastName", "Wurst")
            .equals("firstName", "Hans")
            .compile(Some("vitae"))
            .unwrap();
        assert_eq!(
            statement.to_string(),
            "SELECT resume FROM Person WHERE lastName = 'Wurst' AND firstName = 'Hans'"
        );
    }

    #[test]
    fn test_compile_coerces_values() {
        let statement = Query::new(person()).equals("weight", 80).compile(None).unwrap();
        match statement {
            Statement::Select { criteria, .. } => {
                assert_eq!(criteria[0].value, Value::Float(80.0));
            }
            other => panic!("unexpected statement: {other}"),
        }
    }

    #[test]
    fn test_empty_query_selects_all() {
        let statement = Query::new(person()).compile(None).unwrap();
        assert_eq!(statement, Statement::select_all("Person"));
    }

    #[test]
    fn test_unknown_property_fails_on_compile() {
        let query = Query::new(person()).equals("nickname", "Hansi");
        let err = query.compile(None).unwrap_err();
        assert_eq!(err.field(), Some("nickname"));

        let err = Query::new(person()).compile(Some("age")).unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));
    }
}
