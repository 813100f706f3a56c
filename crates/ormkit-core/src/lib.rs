//! ormkit core - schema registry, entity instances, sessions and queries.
//!
//! This crate maps declared entity schemas onto a relational store reached
//! through the [`storage::Backend`] traits, and ships a sled-backed store.

pub mod catalog;
pub mod constraint;
pub mod entity;
pub mod error;
pub mod query;
pub mod session;
pub mod storage;

pub use catalog::{field_specs_from_json, FieldDescriptor, FieldSpec, Registry, Schema};
pub use constraint::Validator;
pub use entity::{Entity, EntityId, EntityRef, EntityState};
pub use error::{ConstraintError, Error, Result, SchemaError};
pub use query::{Query, ResultSet};
pub use session::{with_session, Session};
pub use storage::{Backend, BackendTransaction, SledBackend, SledTransaction, StorageConfig};

/// Re-export protocol types.
pub use ormkit_proto as proto;
