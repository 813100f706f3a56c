//! Registered entity schemas.

use std::collections::HashSet;

use ormkit_proto::{TableDef, ValueKind};

use super::field::{FieldDescriptor, FieldSpec};
use crate::error::SchemaError;

/// An immutable entity schema: a name plus ordered field descriptors.
///
/// Instances share their schema through an `Arc`; nothing mutates it after
/// registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Build a schema from ordered field specifications.
    ///
    /// Fails when a type name is unknown, a property is declared twice, a
    /// column name collides with another field's, or a default does not fit
    /// its field.
    pub fn build<I, K>(name: impl Into<String>, specs: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<String>,
    {
        let name = name.into();
        let invalid = |field: &str, reason: String| SchemaError::InvalidFieldSpec {
            schema: name.clone(),
            field: field.to_string(),
            reason,
        };

        if name.trim().is_empty() {
            return Err(invalid("", "schema name must not be empty".into()));
        }
        // Row keys are `name 0x00 id`, so a control byte in the name could
        // land inside another table's key range.
        if name.chars().any(char::is_control) {
            return Err(invalid(
                "",
                "schema name must not contain control characters".into(),
            ));
        }

        let mut fields: Vec<FieldDescriptor> = Vec::new();
        let mut properties = HashSet::new();
        let mut columns = HashSet::new();

        for (property, spec) in specs {
            let property = property.into();
            if property.trim().is_empty() {
                return Err(invalid(&property, "property name must not be empty".into()));
            }
            if !properties.insert(property.clone()) {
                return Err(invalid(&property, "property declared twice".into()));
            }

            let kind: ValueKind = spec
                .kind
                .parse()
                .map_err(|_| invalid(&property, format!("unknown type '{}'", spec.kind)))?;

            let column = spec.column.unwrap_or_else(|| property.clone());
            if column.trim().is_empty() {
                return Err(invalid(&property, "column name must not be empty".into()));
            }
            if !columns.insert(column.clone()) {
                return Err(invalid(
                    &property,
                    format!("column '{column}' is already mapped by another field"),
                ));
            }

            let default = match spec.default {
                None => None,
                Some(value) if value.is_null() => None,
                Some(value) => Some(kind.coerce(&value).ok_or_else(|| {
                    invalid(
                        &property,
                        format!("default {value} is not a {kind} value"),
                    )
                })?),
            };

            fields.push(FieldDescriptor {
                name: property,
                column,
                kind,
                nullable: spec.nullable,
                unique: spec.unique,
                default,
            });
        }

        Ok(Self { name, fields })
    }

    /// Schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the backing table.
    pub fn table(&self) -> &str {
        &self.name
    }

    /// Field descriptors in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by property name.
    pub fn field(&self, property: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == property)
    }

    /// Position of a property in declaration order.
    pub fn field_index(&self, property: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == property)
    }

    /// Look up a field by storage column name.
    pub fn field_by_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Fields carrying a unique constraint.
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.unique)
    }

    /// The table definition handed to the backing store.
    pub fn table_def(&self) -> TableDef {
        TableDef {
            name: self.table().to_string(),
            columns: self.fields.iter().map(FieldDescriptor::column_def).collect(),
        }
    }
}
