//! Entry point: schema declaration and session scoping.

use std::fmt;
use std::sync::Arc;

use ormkit_core::{
    Backend, Error, FieldSpec, Registry, Result, Schema, Session, SledBackend, StorageConfig,
};

use crate::class::EntityClass;

struct Inner {
    backend: Arc<dyn Backend>,
    registry: Registry,
}

/// A store plus the entity classes declared against it.
///
/// Cloning is cheap and every clone shares the same store and registry.
#[derive(Clone)]
pub struct Persistence {
    inner: Arc<Inner>,
}

impl Persistence {
    /// Open a sled-backed store.
    pub fn open(config: StorageConfig) -> Result<Self> {
        tracing::info!(path = ?config.path, temporary = config.temporary, "opening store");
        let backend = SledBackend::open(config)?;
        Ok(Self::with_backend(Arc::new(backend)))
    }

    /// Open a throwaway store, deleted when the last handle is dropped.
    pub fn temporary() -> Result<Self> {
        Self::open(StorageConfig::temporary())
    }

    /// Use an existing backend.
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                registry: Registry::new(),
            }),
        }
    }

    /// The backing store.
    pub fn backend(&self) -> &dyn Backend {
        &*self.inner.backend
    }

    /// The schema registry.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Declare an entity class.
    ///
    /// The backing table is created right away. Declaring the same name
    /// twice fails with a duplicate schema error.
    pub fn define_class<I, K>(&self, name: impl Into<String>, specs: I) -> Result<EntityClass>
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<String>,
    {
        let schema = self
            .inner
            .registry
            .define_with(name, specs, |schema| self.create_table(schema))?;
        Ok(self.declared(schema))
    }

    /// Declare an entity class from a JSON object of field specifications,
    /// e.g. `{"vitae": {"type": "text", "column": "resume", "unique": true}}`.
    pub fn define_class_json(&self, name: impl Into<String>, json: &str) -> Result<EntityClass> {
        let schema = self
            .inner
            .registry
            .define_json_with(name, json, |schema| self.create_table(schema))?;
        Ok(self.declared(schema))
    }

    /// Look up a declared class.
    pub fn class(&self, name: &str) -> Result<EntityClass> {
        let schema = self.inner.registry.require(name)?;
        Ok(EntityClass::new(self.clone(), schema))
    }

    /// Open a session. It rolls back unless committed.
    pub fn session(&self) -> Result<Session<'_>> {
        Session::begin(self.backend())
    }

    /// Run `f` in a new session, committing on success and rolling back on
    /// failure.
    pub fn with_session<'s, T, E, F>(&'s self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Session<'s>) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        ormkit_core::with_session(self.backend(), f)
    }

    fn create_table(&self, schema: &Schema) -> Result<()> {
        self.inner.backend.ensure_table(&schema.table_def())?;
        Ok(())
    }

    fn declared(&self, schema: Arc<Schema>) -> EntityClass {
        tracing::debug!(class = %schema.name(), table = %schema.table(), "class declared");
        EntityClass::new(self.clone(), schema)
    }
}

impl fmt::Debug for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persistence")
            .field("classes", &self.inner.registry.names())
            .finish_non_exhaustive()
    }
}
