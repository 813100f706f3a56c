//! Process-wide registry of entity schemas.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::field::{field_specs_from_json, FieldSpec};
use super::schema::Schema;
use crate::error::{Error, SchemaError};

/// Maps schema names to their registered, shared schema.
#[derive(Debug, Default)]
pub struct Registry {
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and register a schema.
    ///
    /// Registering a name twice is an error, not a no-op.
    pub fn define<I, K>(&self, name: impl Into<String>, specs: I) -> Result<Arc<Schema>, Error>
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<String>,
    {
        self.define_with(name, specs, |_| Ok(()))
    }

    /// Build a schema, run `prepare` on it, then register it.
    ///
    /// Nothing is registered when `prepare` fails, so it can allocate the
    /// backing table first.
    pub fn define_with<I, K, F>(
        &self,
        name: impl Into<String>,
        specs: I,
        prepare: F,
    ) -> Result<Arc<Schema>, Error>
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<String>,
        F: FnOnce(&Schema) -> Result<(), Error>,
    {
        let name = name.into();
        self.ensure_available(&name)?;
        let schema = Schema::build(name, specs)?;
        prepare(&schema)?;
        self.insert(schema)
    }

    /// Like [`Registry::define_with`], for fields declared as a JSON object.
    pub fn define_json_with<F>(
        &self,
        name: impl Into<String>,
        json: &str,
        prepare: F,
    ) -> Result<Arc<Schema>, Error>
    where
        F: FnOnce(&Schema) -> Result<(), Error>,
    {
        let name = name.into();
        self.ensure_available(&name)?;
        let specs = field_specs_from_json(&name, json)?;
        self.define_with(name, specs, prepare)
    }

    /// Fail if the name is already taken.
    pub fn ensure_available(&self, name: &str) -> Result<(), Error> {
        if self.schemas.read().contains_key(name) {
            return Err(SchemaError::DuplicateSchema {
                schema: name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Register an already built schema.
    pub fn insert(&self, schema: Schema) -> Result<Arc<Schema>, Error> {
        let mut schemas = self.schemas.write();
        if schemas.contains_key(schema.name()) {
            return Err(SchemaError::DuplicateSchema {
                schema: schema.name().to_string(),
            }
            .into());
        }
        let schema = Arc::new(schema);
        schemas.insert(schema.name().to_string(), schema.clone());
        tracing::info!(schema = %schema.name(), fields = schema.fields().len(), "schema registered");
        Ok(schema)
    }

    /// Get a schema by name.
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.read().get(name).cloned()
    }

    /// Get a schema by name, failing if it is not registered.
    pub fn require(&self, name: &str) -> Result<Arc<Schema>, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnknownSchema(name.to_string()))
    }

    /// Registered schema names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }
}
