//! Entity classes and their query sugar.

use std::sync::Arc;

use ormkit_core::proto::Value;
use ormkit_core::{Entity, EntityRef, Query, Result, ResultSet, Schema, Session};

use crate::instance::Instance;
use crate::persistence::Persistence;

/// A declared entity type: constructs instances and looks them up.
///
/// Lookups that do not take a session run in a session of their own.
#[derive(Debug, Clone)]
pub struct EntityClass {
    persistence: Persistence,
    schema: Arc<Schema>,
}

impl EntityClass {
    pub(crate) fn new(persistence: Persistence, schema: Arc<Schema>) -> Self {
        Self {
            persistence,
            schema,
        }
    }

    /// Class name.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// The registered schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// A new transient instance with every property at its initial value.
    pub fn new_instance(&self) -> Instance {
        self.wrap(EntityRef::new(Entity::new(self.schema.clone())))
    }

    /// A new transient instance with the given properties assigned.
    pub fn create<I, K, V>(&self, values: I) -> Result<Instance>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let entity = Entity::with_values(self.schema.clone(), values)?;
        Ok(self.wrap(EntityRef::new(entity)))
    }

    /// Fetch an instance by identifier.
    pub fn get(&self, id: u64) -> Result<Option<Instance>> {
        self.persistence
            .with_session(|session| self.get_in(session, id))
    }

    /// Fetch an instance by identifier within a session.
    pub fn get_in(&self, session: &mut Session<'_>, id: u64) -> Result<Option<Instance>> {
        Ok(session
            .get(&self.schema, id)?
            .map(|entity| self.wrap(entity)))
    }

    /// Every stored instance, in identifier order.
    pub fn all(&self) -> Result<ResultSet<Instance>> {
        self.query().select()
    }

    /// A fresh query over this class.
    pub fn query(&self) -> ClassQuery {
        ClassQuery {
            class: self.clone(),
            query: Query::new(self.schema.clone()),
        }
    }

    /// Delete every stored instance. Returns the number of deleted rows.
    pub fn delete_all(&self) -> Result<usize> {
        self.persistence
            .with_session(|session| session.delete_all(&self.schema))
    }

    pub(crate) fn wrap(&self, entity: EntityRef) -> Instance {
        Instance::new(self.persistence.clone(), entity)
    }
}

/// A query bound to an entity class.
///
/// Each [`ClassQuery::equals`] returns a new query; the receiver is left
/// unchanged.
#[derive(Debug, Clone)]
pub struct ClassQuery {
    class: EntityClass,
    query: Query,
}

impl ClassQuery {
    /// Additionally require `property == value`.
    #[must_use]
    pub fn equals(&self, property: impl Into<String>, value: impl Into<Value>) -> ClassQuery {
        ClassQuery {
            class: self.class.clone(),
            query: self.query.equals(property, value),
        }
    }

    /// The underlying query.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Execute in a session of its own and return whole instances.
    pub fn select(&self) -> Result<ResultSet<Instance>> {
        self.class
            .persistence
            .with_session(|session| self.select_in(session))
    }

    /// Execute within a session and return whole instances.
    pub fn select_in(&self, session: &mut Session<'_>) -> Result<ResultSet<Instance>> {
        let entities = self.query.select(session)?;
        Ok(entities.map(|entity| self.class.wrap(entity)))
    }

    /// Execute in a session of its own and return one property per match.
    pub fn select_property(&self, property: &str) -> Result<ResultSet<Value>> {
        self.class
            .persistence
            .with_session(|session| self.query.select_property(session, property))
    }
}
