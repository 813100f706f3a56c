//! Schema registry.
//!
//! Declared entity schemas are validated once, registered under their name,
//! and shared read-only by every instance of that type.

mod field;
mod registry;
mod schema;

pub use field::{field_specs_from_json, FieldDescriptor, FieldSpec};
pub use registry::Registry;
pub use schema::Schema;
