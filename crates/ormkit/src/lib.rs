//! ormkit - a lightweight embedded object-relational persistence layer.
//!
//! Declare entity classes with typed, constrained fields, then create,
//! save, fetch, query and remove instances. Values are validated when an
//! instance is saved; every operation runs inside a session that commits
//! on success and rolls back on failure.
//!
//! # Quick Start
//!
//! ```ignore
//! use ormkit::prelude::*;
//!
//! let store = Persistence::temporary()?;
//! let person = store.define_class(
//!     "Person",
//!     vec![
//!         ("firstName", FieldSpec::new("string").not_null()),
//!         ("lastName", FieldSpec::new("string").not_null()),
//!         ("vitae", FieldSpec::new("text").column("resume").unique()),
//!     ],
//! )?;
//!
//! let hans = person.create(vec![("firstName", "Hans"), ("lastName", "Wurst")])?;
//! let id = hans.save()?;
//!
//! let vitae = person
//!     .query()
//!     .equals("lastName", "Wurst")
//!     .select_property("vitae")?;
//! ```

mod class;
mod instance;
mod persistence;

pub use class::{ClassQuery, EntityClass};
pub use instance::Instance;
pub use persistence::Persistence;

pub use ormkit_core::{
    with_session, Backend, BackendTransaction, ConstraintError, EntityId, EntityRef, EntityState,
    Error, FieldSpec, Query, Result, ResultSet, Schema, SchemaError, Session, SledBackend,
    StorageConfig,
};
pub use ormkit_proto::{Value, ValueKind};

/// Re-export the core crate.
pub use ormkit_core as core;

/// Re-export protocol types.
pub use ormkit_proto as proto;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        ClassQuery, EntityClass, Error, FieldSpec, Instance, Persistence, Result, StorageConfig,
        Value,
    };
}
