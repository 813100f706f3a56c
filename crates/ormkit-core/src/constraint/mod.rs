//! Save-time constraint enforcement.
//!
//! Instances are validated at the persistence boundary, never on
//! assignment:
//! - Type checks (with integer to floating point widening)
//! - Nullability checks
//! - Uniqueness checks against rows visible to the session

mod validator;

pub use validator::Validator;
