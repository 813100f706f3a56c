//! Field specifications and the descriptors derived from them.

use ormkit_proto::{ColumnDef, Value, ValueKind};
use serde::Deserialize;

use crate::error::SchemaError;

fn default_nullable() -> bool {
    true
}

/// A declared property as written by the caller.
///
/// Mirrors the `{type, nullable, unique, column}` literal used to declare
/// entity classes, so it deserializes straight from JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldSpec {
    /// Declared type name, e.g. `"string"` or `"timestamp"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether null is accepted. Defaults to true.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Whether values must be distinct across rows. Defaults to false.
    #[serde(default)]
    pub unique: bool,
    /// Storage column name. Defaults to the property name.
    #[serde(default)]
    pub column: Option<String>,
    /// Value assigned to the slot when an instance is constructed without it.
    #[serde(skip)]
    pub default: Option<Value>,
}

impl FieldSpec {
    /// Create a nullable, non-unique field of the named type.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            nullable: true,
            unique: false,
            column: None,
            default: None,
        }
    }

    /// Create a field of a known kind.
    pub fn of(kind: ValueKind) -> Self {
        Self::new(kind.name())
    }

    /// Reject null.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Require distinct values.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Store under a different column name.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Set the construction-time default.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Per-property metadata of a registered schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Property name.
    pub name: String,
    /// Storage column name.
    pub column: String,
    /// Declared kind.
    pub kind: ValueKind,
    /// Whether null is accepted.
    pub nullable: bool,
    /// Whether values must be distinct across rows.
    pub unique: bool,
    /// Construction-time default, already coerced to `kind`.
    pub default: Option<Value>,
}

impl FieldDescriptor {
    /// The value a freshly constructed instance holds in this slot.
    pub fn initial_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }

    /// The column definition handed to the backing store.
    pub fn column_def(&self) -> ColumnDef {
        ColumnDef {
            name: self.column.clone(),
            kind: self.kind,
            nullable: self.nullable,
            unique: self.unique,
        }
    }
}

/// Parse field specifications from a JSON object, keeping declaration order.
///
/// Each property maps to a `{type, nullable, unique, column, default}`
/// object. Only scalar JSON defaults are accepted.
pub fn field_specs_from_json(
    schema: &str,
    json: &str,
) -> Result<Vec<(String, FieldSpec)>, SchemaError> {
    let invalid = |field: &str, reason: String| SchemaError::InvalidFieldSpec {
        schema: schema.to_string(),
        field: field.to_string(),
        reason,
    };

    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).map_err(|e| invalid("", e.to_string()))?;

    object
        .into_iter()
        .map(|(property, raw)| {
            let default = match raw.get("default") {
                Some(value) => Some(
                    json_scalar(value)
                        .ok_or_else(|| invalid(&property, format!("unsupported default {value}")))?,
                ),
                None => None,
            };
            let mut spec: FieldSpec =
                serde_json::from_value(raw).map_err(|e| invalid(&property, e.to_string()))?;
            spec.default = default;
            Ok((property, spec))
        })
        .collect()
}

fn json_scalar(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Null => Some(Value::Null),
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Float)),
        serde_json::Value::String(s) => Some(Value::String(s.clone())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_spec_builder() {
        let spec = FieldSpec::of(ValueKind::Text).column("resume").unique();
        assert_eq!(spec.kind, "text");
        assert!(spec.nullable);
        assert!(spec.unique);
        assert_eq!(spec.column.as_deref(), Some("resume"));
    }

    #[test]
    fn test_field_spec_from_json_defaults() {
        let spec: FieldSpec = serde_json::from_str(r#"{"type": "string"}"#).unwrap();
        assert_eq!(spec, FieldSpec::new("string"));

        let spec: FieldSpec =
            serde_json::from_str(r#"{"column": "resume", "type": "text", "unique": true}"#)
                .unwrap();
        assert!(spec.unique);
        assert!(spec.nullable);
        assert_eq!(spec.column.as_deref(), Some("resume"));
    }

    #[test]
    fn test_specs_from_json_keep_order() {
        let specs = field_specs_from_json(
            "Person",
            r#"{
                "lastName": {"type": "string", "nullable": false},
                "firstName": {"type": "string", "nullable": false},
                "age": {"type": "integer", "default": 18}
            }"#,
        )
        .unwrap();
        let names: Vec<_> = specs.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["lastName", "firstName", "age"]);
        assert!(!specs[0].1.nullable);
        assert_eq!(specs[2].1.default, Some(Value::Integer(18)));
    }

    #[test]
    fn test_specs_from_json_errors() {
        let err = field_specs_from_json("Person", "[1, 2]").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidFieldSpec { .. }));

        let err = field_specs_from_json("Person", r#"{"age": {"nullable": true}}"#).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::InvalidFieldSpec { ref field, .. } if field == "age"
        ));

        let err =
            field_specs_from_json("Person", r#"{"tags": {"type": "text", "default": [1]}}"#)
                .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidFieldSpec { .. }));
    }

    #[test]
    fn test_initial_value() {
        let descriptor = FieldDescriptor {
            name: "age".into(),
            column: "age".into(),
            kind: ValueKind::Integer,
            nullable: true,
            unique: false,
            default: None,
        };
        assert_eq!(descriptor.initial_value(), Value::Null);

        let with_default = FieldDescriptor {
            default: Some(Value::Integer(18)),
            ..descriptor
        };
        assert_eq!(with_default.initial_value(), Value::Integer(18));
    }
}
