//! Validation of instance values against their schema.

use ormkit_proto::{Clause, Outcome, Statement, Value, ValueKind};

use crate::catalog::Schema;
use crate::entity::EntityId;
use crate::error::{ConstraintError, Error};

/// Checks instance values against the field descriptors of one schema.
///
/// Passes run in a fixed order so the most specific failure surfaces first:
/// every field is type checked, then nullability is checked, then
/// uniqueness. Within a pass fields are visited in declaration order.
pub struct Validator<'a> {
    schema: &'a Schema,
}

impl<'a> Validator<'a> {
    /// Create a validator for a schema.
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Run all passes and return the coerced values.
    ///
    /// `probe` executes the uniqueness lookups inside the caller's
    /// transaction. `own_id` excludes the instance's own row.
    pub fn validate<F>(
        &self,
        values: &[Value],
        own_id: Option<EntityId>,
        probe: F,
    ) -> Result<Vec<Value>, Error>
    where
        F: FnMut(&Statement) -> Result<Outcome, Error>,
    {
        let coerced = self.check_types(values)?;
        self.check_required(&coerced)?;
        self.check_unique(&coerced, own_id, probe)?;
        Ok(coerced)
    }

    /// Coerce every non-null value to its declared kind.
    pub fn check_types(&self, values: &[Value]) -> Result<Vec<Value>, ConstraintError> {
        self.schema
            .fields()
            .iter()
            .zip(values)
            .map(|(field, value)| {
                if value.is_null() {
                    return Ok(Value::Null);
                }
                field
                    .kind
                    .coerce(value)
                    .ok_or_else(|| ConstraintError::TypeMismatch {
                        schema: self.schema.name().to_string(),
                        field: field.name.clone(),
                        expected: field.kind,
                        actual: match (field.kind, value) {
                            (ValueKind::Integer, Value::Integer(_)) => {
                                "integer outside the 32-bit range"
                            }
                            _ => value.type_name(),
                        },
                    })
            })
            .collect()
    }

    /// Reject nulls in non-nullable fields.
    pub fn check_required(&self, values: &[Value]) -> Result<(), ConstraintError> {
        for (field, value) in self.schema.fields().iter().zip(values) {
            if !field.nullable && value.is_null() {
                return Err(ConstraintError::MissingRequiredField {
                    schema: self.schema.name().to_string(),
                    field: field.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Reject values of unique fields already held by another row.
    ///
    /// Null never collides.
    pub fn check_unique<F>(
        &self,
        values: &[Value],
        own_id: Option<EntityId>,
        mut probe: F,
    ) -> Result<(), Error>
    where
        F: FnMut(&Statement) -> Result<Outcome, Error>,
    {
        for (field, value) in self.schema.fields().iter().zip(values) {
            if !field.unique || value.is_null() {
                continue;
            }
            let lookup = Statement::Select {
                table: self.schema.table().to_string(),
                criteria: vec![Clause::eq(field.column.clone(), value.clone())],
                projection: Some(field.column.clone()),
            };
            let taken = probe(&lookup)?
                .into_rows()
                .iter()
                .any(|row| Some(EntityId(row.id)) != own_id);
            if taken {
                return Err(ConstraintError::UniqueViolation {
                    schema: self.schema.name().to_string(),
                    field: field.name.clone(),
                    value: value.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}
