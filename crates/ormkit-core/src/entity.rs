//! Entity instances: mutable records bound to one schema.
//!
//! Assignment only checks that the property exists. Values are checked
//! against the declared kinds when the instance is saved.

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use ormkit_proto::{Row, Value};

use crate::catalog::{FieldDescriptor, Schema};
use crate::error::{Error, Result};

/// Store-generated identifier of a persisted instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The raw identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of an instance relative to its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Constructed in memory, never saved.
    Transient,
    /// Backed by a row.
    Persistent,
    /// Its row was deleted; the identifier is kept for reference.
    Removed,
}

/// An in-memory record conforming to one schema.
#[derive(Debug, Clone)]
pub struct Entity {
    schema: Arc<Schema>,
    id: Option<EntityId>,
    state: EntityState,
    values: Vec<Value>,
}

impl Entity {
    /// Create an instance with every slot at its initial value.
    pub fn new(schema: Arc<Schema>) -> Self {
        let values = schema
            .fields()
            .iter()
            .map(FieldDescriptor::initial_value)
            .collect();
        Self {
            schema,
            id: None,
            state: EntityState::Transient,
            values,
        }
    }

    /// Create an instance from an initial property mapping.
    ///
    /// Only the given properties are assigned; naming an undeclared property
    /// is an error.
    pub fn with_values<I, K, V>(schema: Arc<Schema>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut entity = Self::new(schema);
        for (property, value) in values {
            entity.set(property.as_ref(), value)?;
        }
        Ok(entity)
    }

    /// Rebuild an instance from a stored row. Columns the row lacks read as null.
    pub(crate) fn from_row(schema: Arc<Schema>, row: Row) -> Self {
        let mut values = vec![Value::Null; schema.fields().len()];
        for (column, value) in row.values {
            if let Some(index) = schema.fields().iter().position(|f| f.column == column) {
                values[index] = value;
            }
        }
        Self {
            schema,
            id: Some(EntityId(row.id)),
            state: EntityState::Persistent,
            values,
        }
    }

    /// The shared schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The identifier, once saved.
    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    /// Lifecycle state.
    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Whether the instance is backed by a row.
    pub fn is_persistent(&self) -> bool {
        self.state == EntityState::Persistent
    }

    /// Read a property.
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.schema
            .field_index(property)
            .map(|index| &self.values[index])
    }

    /// Assign a property. The value is not checked against its kind here.
    pub fn set(&mut self, property: &str, value: impl Into<Value>) -> Result<()> {
        let index = self
            .schema
            .field_index(property)
            .ok_or_else(|| Error::UnknownField {
                schema: self.schema.name().to_string(),
                field: property.to_string(),
            })?;
        self.values[index] = value.into();
        Ok(())
    }

    /// Slot values in declaration order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Property/value pairs in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name.as_str())
            .zip(self.values.iter())
    }

    pub(crate) fn replace_values(&mut self, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.values.len());
        self.values = values;
    }

    pub(crate) fn mark_persistent(&mut self, id: EntityId) {
        self.id = Some(id);
        self.state = EntityState::Persistent;
    }

    pub(crate) fn mark_removed(&mut self) {
        if self.id.is_some() {
            self.state = EntityState::Removed;
        }
    }

    pub(crate) fn reset_transient(&mut self) {
        self.id = None;
        self.state = EntityState::Transient;
    }
}

/// A shared handle to an instance.
///
/// A session hands out the same handle for the same identity, so two
/// lookups can be compared with [`EntityRef::ptr_eq`].
#[derive(Debug, Clone)]
pub struct EntityRef(Arc<RwLock<Entity>>);

impl EntityRef {
    /// Wrap an instance.
    pub fn new(entity: Entity) -> Self {
        Self(Arc::new(RwLock::new(entity)))
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(a: &EntityRef, b: &EntityRef) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Borrow the instance for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Entity> {
        self.0.read()
    }

    /// Borrow the instance for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Entity> {
        self.0.write()
    }

    /// The shared schema.
    pub fn schema(&self) -> Arc<Schema> {
        self.read().schema().clone()
    }

    /// The identifier, once saved.
    pub fn id(&self) -> Option<EntityId> {
        self.read().id()
    }

    /// Lifecycle state.
    pub fn state(&self) -> EntityState {
        self.read().state()
    }

    /// Read a property (cloned).
    pub fn get(&self, property: &str) -> Option<Value> {
        self.read().get(property).cloned()
    }

    /// Assign a property.
    pub fn set(&self, property: &str, value: impl Into<Value>) -> Result<()> {
        self.write().set(property, value)
    }
}

impl From<Entity> for EntityRef {
    fn from(entity: Entity) -> Self {
        EntityRef::new(entity)
    }
}
