//! Unit-of-work sessions.
//!
//! A session owns one backend transaction and an identity map. Within a
//! session every persistent identity is materialized at most once, so two
//! lookups of the same row hand back the same [`EntityRef`].
//!
//! The transaction is released exactly once: by [`Session::commit`],
//! [`Session::rollback`], an abort after the store became unavailable, or
//! by dropping the session (which rolls back).

use std::collections::HashMap;
use std::sync::Arc;

use ormkit_proto::{BackendError, Outcome, Row, Statement, Value};

use crate::catalog::Schema;
use crate::constraint::Validator;
use crate::entity::{Entity, EntityId, EntityRef, EntityState};
use crate::error::{ConstraintError, Error, Result};
use crate::query::{Query, ResultSet};
use crate::storage::{Backend, BackendTransaction};

type IdentityKey = (String, EntityId);

/// A unit of work over one backend transaction.
pub struct Session<'a> {
    tx: Option<Box<dyn BackendTransaction + 'a>>,
    identity_map: HashMap<IdentityKey, EntityRef>,
    /// Schemas touched by this session, by table name.
    schemas: HashMap<String, Arc<Schema>>,
    /// Instances that received their identifier in this session.
    inserted: Vec<EntityRef>,
    /// Instances detached in this session.
    removed: Vec<EntityRef>,
}

impl<'a> Session<'a> {
    /// Open a session with a fresh transaction.
    pub fn begin(backend: &'a dyn Backend) -> Result<Self> {
        let tx = backend.begin()?;
        tracing::debug!("session opened");
        Ok(Self {
            tx: Some(tx),
            identity_map: HashMap::new(),
            schemas: HashMap::new(),
            inserted: Vec::new(),
            removed: Vec::new(),
        })
    }

    /// Whether the transaction is still active.
    pub fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    /// Number of instances in the identity map.
    pub fn managed_count(&self) -> usize {
        self.identity_map.len()
    }

    /// Whether this exact instance is the one mapped for its identity.
    pub fn is_managed(&self, entity: &EntityRef) -> bool {
        let entity_ref = entity.read();
        let Some(id) = entity_ref.id() else {
            return false;
        };
        self.identity_map
            .get(&(entity_ref.schema().name().to_string(), id))
            .is_some_and(|mapped| EntityRef::ptr_eq(mapped, entity))
    }

    /// Insert or update an instance.
    ///
    /// The instance is validated first (types, then nullability, then
    /// uniqueness). A rejected save writes nothing and leaves the instance
    /// unchanged; on success the coerced values are written back to it and a
    /// new instance receives its generated identifier.
    pub fn save(&mut self, entity: &EntityRef) -> Result<EntityId> {
        self.ensure_open()?;

        let (schema, id, state, values) = {
            let entity = entity.read();
            (
                entity.schema().clone(),
                entity.id(),
                entity.state(),
                entity.values().to_vec(),
            )
        };
        if let (EntityState::Removed, Some(id)) = (state, id) {
            return Err(Error::DetachedEntity {
                schema: schema.name().to_string(),
                id: id.get(),
            });
        }
        self.track(&schema);

        let coerced =
            Validator::new(&schema).validate(&values, id, |statement| self.execute(statement))?;
        let columns: Vec<(String, Value)> = schema
            .fields()
            .iter()
            .map(|field| field.column.clone())
            .zip(coerced.iter().cloned())
            .collect();

        match id {
            None => {
                let outcome = self.execute(&Statement::Insert {
                    table: schema.table().to_string(),
                    values: columns,
                })?;
                let id = outcome.inserted_id().map(EntityId).ok_or_else(|| {
                    Error::Backend(BackendError::Corrupt("insert returned no identifier".into()))
                })?;

                {
                    let mut entity = entity.write();
                    entity.replace_values(coerced);
                    entity.mark_persistent(id);
                }
                self.inserted.push(entity.clone());
                self.identity_map
                    .insert((schema.name().to_string(), id), entity.clone());

                tracing::debug!(schema = %schema.name(), %id, "instance inserted");
                Ok(id)
            }
            Some(id) => {
                let affected = self
                    .execute(&Statement::Update {
                        table: schema.table().to_string(),
                        id: id.get(),
                        values: columns,
                    })?
                    .affected();
                if affected == 0 {
                    return Err(Error::DetachedEntity {
                        schema: schema.name().to_string(),
                        id: id.get(),
                    });
                }

                let key = (schema.name().to_string(), id);
                match self.identity_map.get(&key) {
                    Some(mapped) if !EntityRef::ptr_eq(mapped, entity) => {
                        mapped.write().replace_values(coerced.clone());
                    }
                    Some(_) => {}
                    None => {
                        self.identity_map.insert(key, entity.clone());
                    }
                }
                entity.write().replace_values(coerced);

                tracing::debug!(schema = %schema.name(), %id, "instance updated");
                Ok(id)
            }
        }
    }

    /// Look up an instance by identifier.
    ///
    /// Returns the identity-mapped instance when this session already
    /// materialized it, otherwise fetches and maps the row. `None` when no
    /// row exists.
    pub fn get(
        &mut self,
        schema: &Arc<Schema>,
        id: impl Into<EntityId>,
    ) -> Result<Option<EntityRef>> {
        self.ensure_open()?;
        let id = id.into();
        if let Some(mapped) = self.identity_map.get(&(schema.name().to_string(), id)) {
            return Ok(Some(mapped.clone()));
        }

        self.track(schema);
        let rows = self
            .execute(&Statement::Fetch {
                table: schema.table().to_string(),
                id: id.get(),
            })?
            .into_rows();
        Ok(rows
            .into_iter()
            .next()
            .map(|row| self.materialize(schema, row)))
    }

    /// Delete an instance's row and detach it.
    ///
    /// Removing an instance that was never saved, was already removed, or
    /// whose row is already gone is a successful no-op.
    pub fn remove(&mut self, entity: &EntityRef) -> Result<()> {
        self.ensure_open()?;

        let (schema, id, state) = {
            let entity = entity.read();
            (entity.schema().clone(), entity.id(), entity.state())
        };
        let Some(id) = id.filter(|_| state == EntityState::Persistent) else {
            return Ok(());
        };
        self.track(&schema);

        let affected = self
            .execute(&Statement::Delete {
                table: schema.table().to_string(),
                id: id.get(),
            })?
            .affected();
        if affected == 0 {
            tracing::debug!(schema = %schema.name(), %id, "row already absent");
        }

        entity.write().mark_removed();
        self.removed.push(entity.clone());
        if let Some(mapped) = self.identity_map.remove(&(schema.name().to_string(), id)) {
            if !EntityRef::ptr_eq(&mapped, entity) {
                mapped.write().mark_removed();
                self.removed.push(mapped);
            }
        }

        tracing::debug!(schema = %schema.name(), %id, "instance removed");
        Ok(())
    }

    /// A fresh query over a schema.
    pub fn query(&self, schema: &Arc<Schema>) -> Query {
        Query::new(schema.clone())
    }

    /// Every instance of a schema, in identifier order.
    pub fn all(&mut self, schema: &Arc<Schema>) -> Result<ResultSet<EntityRef>> {
        self.query(schema).select(self)
    }

    /// Delete every row of a schema and detach the mapped instances.
    pub fn delete_all(&mut self, schema: &Arc<Schema>) -> Result<usize> {
        self.ensure_open()?;
        self.track(schema);

        let deleted = self
            .execute(&Statement::DeleteAll {
                table: schema.table().to_string(),
            })?
            .affected();

        let detached: Vec<IdentityKey> = self
            .identity_map
            .keys()
            .filter(|(name, _)| name == schema.name())
            .cloned()
            .collect();
        for key in detached {
            if let Some(entity) = self.identity_map.remove(&key) {
                entity.write().mark_removed();
                self.removed.push(entity);
            }
        }

        tracing::debug!(schema = %schema.name(), deleted, "all rows deleted");
        Ok(deleted)
    }

    /// Commit the transaction.
    ///
    /// A failed commit rolls everything back; a store-level uniqueness
    /// rejection is reported as a constraint violation.
    pub fn commit(mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(Error::SessionClosed)?;
        match tx.commit() {
            Ok(()) => {
                self.inserted.clear();
                self.removed.clear();
                tracing::debug!(managed = self.identity_map.len(), "session committed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "commit failed, session rolled back");
                self.discard();
                Err(self.translate(err))
            }
        }
    }

    /// Roll the transaction back.
    ///
    /// Instances inserted in this session lose their identifier again and
    /// instances removed in this session become persistent again.
    pub fn rollback(mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(Error::SessionClosed)?;
        self.discard();
        tx.rollback()?;
        tracing::debug!("session rolled back");
        Ok(())
    }

    pub(crate) fn select_rows(&mut self, statement: &Statement) -> Result<Vec<Row>> {
        self.ensure_open()?;
        self.execute(statement).map(Outcome::into_rows)
    }

    pub(crate) fn select_entities(
        &mut self,
        schema: &Arc<Schema>,
        statement: &Statement,
    ) -> Result<ResultSet<EntityRef>> {
        let rows = self.select_rows(statement)?;
        self.track(schema);
        Ok(rows
            .into_iter()
            .map(|row| self.materialize(schema, row))
            .collect())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.tx.is_none() {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    fn track(&mut self, schema: &Arc<Schema>) {
        self.schemas
            .entry(schema.table().to_string())
            .or_insert_with(|| schema.clone());
    }

    /// Return the mapped instance for a row, hydrating it on first sight.
    fn materialize(&mut self, schema: &Arc<Schema>, row: Row) -> EntityRef {
        self.identity_map
            .entry((schema.name().to_string(), EntityId(row.id)))
            .or_insert_with(|| EntityRef::new(Entity::from_row(schema.clone(), row)))
            .clone()
    }

    fn execute(&mut self, statement: &Statement) -> Result<Outcome> {
        let tx = self.tx.as_mut().ok_or(Error::SessionClosed)?;
        tracing::debug!(%statement, "execute");
        match tx.execute(statement) {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_unavailable() => {
                tracing::warn!(error = %err, "store unavailable, rolling back session");
                self.abort();
                Err(err.into())
            }
            Err(err) => Err(self.translate(err)),
        }
    }

    /// Map a store-level uniqueness rejection back to the violating property.
    fn translate(&self, err: BackendError) -> Error {
        if let BackendError::UniqueViolation {
            table,
            column,
            value,
        } = &err
        {
            if let Some(schema) = self.schemas.get(table) {
                if let Some(field) = schema.field_by_column(column) {
                    return ConstraintError::UniqueViolation {
                        schema: schema.name().to_string(),
                        field: field.name.clone(),
                        value: value.clone(),
                    }
                    .into();
                }
            }
        }
        err.into()
    }

    fn abort(&mut self) {
        if let Some(tx) = self.tx.take() {
            if let Err(err) = tx.rollback() {
                tracing::warn!(error = %err, "rollback failed");
            }
        }
        self.discard();
    }

    /// Undo the in-memory effects of this session's writes.
    fn discard(&mut self) {
        for entity in self.removed.drain(..) {
            let mut entity = entity.write();
            if let (EntityState::Removed, Some(id)) = (entity.state(), entity.id()) {
                entity.mark_persistent(id);
            }
        }
        for entity in self.inserted.drain(..) {
            entity.write().reset_transient();
        }
        self.identity_map.clear();
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::debug!("session dropped while open, rolling back");
            self.abort();
        }
    }
}

/// Run `f` in a new session, committing when it succeeds and rolling back
/// when it fails.
pub fn with_session<'a, T, E, F>(backend: &'a dyn Backend, f: F) -> std::result::Result<T, E>
where
    F: FnOnce(&mut Session<'a>) -> std::result::Result<T, E>,
    E: From<Error>,
{
    let mut session = Session::begin(backend)?;
    match f(&mut session) {
        Ok(value) => {
            session.commit()?;
            Ok(value)
        }
        Err(err) => {
            if session.is_open() {
                if let Err(rollback_err) = session.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldSpec, Registry};
    use crate::storage::{SledBackend, StorageConfig};
    use ormkit_proto::Value;

    fn setup() -> (SledBackend, Arc<Schema>) {
        let backend = SledBackend::open(StorageConfig::temporary()).unwrap();
        let registry = Registry::new();
        let schema = registry
            .define(
                "Person",
                vec![
                    ("firstName", FieldSpec::new("string").not_null()),
                    ("lastName", FieldSpec::new("string").not_null()),
                    ("vitae", FieldSpec::new("text").column("resume").unique()),
                ],
            )
            .unwrap();
        backend.ensure_table(&schema.table_def()).unwrap();
        (backend, schema)
    }

    fn person(schema: &Arc<Schema>, first: &str, last: &str) -> EntityRef {
        Entity::with_values(
            schema.clone(),
            vec![("firstName", first), ("lastName", last)],
        )
        .unwrap()
        .into()
    }

    #[test]
    fn test_save_assigns_id_and_maps_instance() {
        let (backend, schema) = setup();
        let mut session = Session::begin(&backend).unwrap();

        let hans = person(&schema, "Hans", "Wurst");
        let id = session.save(&hans).unwrap();
        assert_eq!(hans.id(), Some(id));
        assert_eq!(hans.state(), EntityState::Persistent);
        assert!(session.is_managed(&hans));

        let fetched = session.get(&schema, id).unwrap().unwrap();
        assert!(EntityRef::ptr_eq(&fetched, &hans));
        session.commit().unwrap();
    }

    #[test]
    fn test_get_missing_row() {
        let (backend, schema) = setup();
        let mut session = Session::begin(&backend).unwrap();
        assert!(session.get(&schema, EntityId(42)).unwrap().is_none());
    }

    #[test]
    fn test_rollback_resets_inserted_ids() {
        let (backend, schema) = setup();
        let hans = person(&schema, "Hans", "Wurst");

        let mut session = Session::begin(&backend).unwrap();
        session.save(&hans).unwrap();
        session.rollback().unwrap();

        assert_eq!(hans.id(), None);
        assert_eq!(hans.state(), EntityState::Transient);
        assert_eq!(backend.row_count("Person").unwrap(), 0);
    }

    #[test]
    fn test_drop_rolls_back() {
        let (backend, schema) = setup();
        let hans = person(&schema, "Hans", "Wurst");
        {
            let mut session = Session::begin(&backend).unwrap();
            session.save(&hans).unwrap();
        }
        assert_eq!(hans.id(), None);
        assert_eq!(backend.row_count("Person").unwrap(), 0);
    }

    #[test]
    fn test_remove_then_save_is_detached() {
        let (backend, schema) = setup();
        let hans = person(&schema, "Hans", "Wurst");

        let mut session = Session::begin(&backend).unwrap();
        let id = session.save(&hans).unwrap();
        session.remove(&hans).unwrap();
        session.remove(&hans).unwrap();
        assert_eq!(hans.state(), EntityState::Removed);
        assert!(session.get(&schema, id).unwrap().is_none());

        let err = session.save(&hans).unwrap_err();
        assert!(matches!(err, Error::DetachedEntity { id: detached, .. } if detached == id.get()));
        session.commit().unwrap();
        assert_eq!(backend.row_count("Person").unwrap(), 0);
    }

    #[test]
    fn test_rollback_restores_removed_instances() {
        let (backend, schema) = setup();
        let hans = person(&schema, "Hans", "Wurst");
        with_session(&backend, |session| session.save(&hans)).unwrap();

        let mut session = Session::begin(&backend).unwrap();
        session.remove(&hans).unwrap();
        session.rollback().unwrap();

        assert_eq!(hans.state(), EntityState::Persistent);
        assert_eq!(backend.row_count("Person").unwrap(), 1);
    }

    #[test]
    fn test_rejected_save_writes_nothing() {
        let (backend, schema) = setup();
        let mut session = Session::begin(&backend).unwrap();

        let nameless = EntityRef::new(Entity::new(schema.clone()));
        let err = session.save(&nameless).unwrap_err();
        assert_eq!(err.field(), Some("firstName"));
        assert_eq!(nameless.id(), None);

        // The session stays usable after a validation failure.
        nameless.set("firstName", "Hans").unwrap();
        nameless.set("lastName", "Wurst").unwrap();
        session.save(&nameless).unwrap();
        session.commit().unwrap();
        assert_eq!(backend.row_count("Person").unwrap(), 1);
    }

    #[test]
    fn test_unique_violation_within_session() {
        let (backend, schema) = setup();
        let mut session = Session::begin(&backend).unwrap();

        let first = person(&schema, "Hans", "Wurst");
        first.set("vitae", "Lorem").unwrap();
        session.save(&first).unwrap();

        let second = person(&schema, "Herbert", "Wurst");
        second.set("vitae", "Lorem").unwrap();
        let err = session.save(&second).unwrap_err();
        assert!(matches!(
            err.as_constraint(),
            Some(ConstraintError::UniqueViolation { field, .. }) if field == "vitae"
        ));

        // Saving the first instance again does not collide with itself.
        session.save(&first).unwrap();
    }

    #[test]
    fn test_delete_all_detaches_mapped_instances() {
        let (backend, schema) = setup();
        let mut session = Session::begin(&backend).unwrap();
        let hans = person(&schema, "Hans", "Wurst");
        let herbert = person(&schema, "Herbert", "Brot");
        session.save(&hans).unwrap();
        session.save(&herbert).unwrap();

        assert_eq!(session.delete_all(&schema).unwrap(), 2);
        assert_eq!(hans.state(), EntityState::Removed);
        assert_eq!(session.managed_count(), 0);
        assert!(session.all(&schema).unwrap().is_empty());
    }

    #[test]
    fn test_update_writes_coerced_values_back() {
        let (backend, schema) = setup();
        let hans = person(&schema, "Hans", "Wurst");
        let id = with_session(&backend, |session| session.save(&hans)).unwrap();

        hans.set("lastName", "Brot").unwrap();
        with_session(&backend, |session| session.save(&hans)).unwrap();

        let mut session = Session::begin(&backend).unwrap();
        let fetched = session.get(&schema, id).unwrap().unwrap();
        assert!(!EntityRef::ptr_eq(&fetched, &hans));
        assert_eq!(fetched.get("lastName"), Some(Value::from("Brot")));
    }

    #[test]
    fn test_with_session_rolls_back_on_error() {
        let (backend, schema) = setup();
        let hans = person(&schema, "Hans", "Wurst");

        let result: Result<()> = with_session(&backend, |session| {
            session.save(&hans)?;
            Err(Error::UnknownSchema("Ghost".into()))
        });
        assert!(matches!(result, Err(Error::UnknownSchema(_))));
        assert_eq!(hans.id(), None);
        assert_eq!(backend.row_count("Person").unwrap(), 0);
    }

    #[test]
    fn test_query_through_session() {
        let (backend, schema) = setup();
        let mut session = Session::begin(&backend).unwrap();
        session.save(&person(&schema, "Hans", "Wurst")).unwrap();
        session.save(&person(&schema, "Herbert", "Wurst")).unwrap();
        session.save(&person(&schema, "Hans", "Brot")).unwrap();

        let wursts = session.query(&schema).equals("lastName", "Wurst");
        assert_eq!(wursts.select(&mut session).unwrap().len(), 2);

        let names = wursts
            .equals("firstName", "Herbert")
            .select_property(&mut session, "firstName")
            .unwrap();
        assert_eq!(names.into_vec(), vec![Value::from("Herbert")]);
    }
}
