//! Entity instances bound to a store.

use ormkit_core::proto::Value;
use ormkit_core::{EntityRef, EntityState, Result};

use crate::persistence::Persistence;

/// An entity instance that knows where to persist itself.
///
/// Clones share the same underlying instance.
#[derive(Debug, Clone)]
pub struct Instance {
    persistence: Persistence,
    entity: EntityRef,
}

impl Instance {
    pub(crate) fn new(persistence: Persistence, entity: EntityRef) -> Self {
        Self {
            persistence,
            entity,
        }
    }

    /// The storage identifier, once saved.
    pub fn id(&self) -> Option<u64> {
        self.entity.id().map(|id| id.get())
    }

    /// Lifecycle state.
    pub fn state(&self) -> EntityState {
        self.entity.state()
    }

    /// Read a property. `None` when the class declares no such property.
    pub fn get(&self, property: &str) -> Option<Value> {
        self.entity.get(property)
    }

    /// Assign a property. Kinds are checked on save, not here.
    pub fn set(&self, property: &str, value: impl Into<Value>) -> Result<()> {
        self.entity.set(property, value)
    }

    /// Insert or update in a session of its own. Returns the identifier.
    pub fn save(&self) -> Result<u64> {
        let id = self
            .persistence
            .with_session(|session| session.save(&self.entity))?;
        Ok(id.get())
    }

    /// Delete in a session of its own. Removing twice is not an error.
    pub fn remove(&self) -> Result<()> {
        self.persistence
            .with_session(|session| session.remove(&self.entity))
    }

    /// The shared entity handle, for use with an explicit session.
    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// Whether both handles refer to the same in-memory instance.
    pub fn same(a: &Instance, b: &Instance) -> bool {
        EntityRef::ptr_eq(&a.entity, &b.entity)
    }
}
