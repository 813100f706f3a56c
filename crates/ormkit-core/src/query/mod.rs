//! Fluent equality queries.
//!
//! A [`Query`] is an immutable value: every [`Query::equals`] call returns
//! a new query with one more clause. Nothing touches the store until the
//! query is executed through a session.

mod builder;
mod result;

pub use builder::Query;
pub use result::ResultSet;
