//! Pre-flight validation of pipeline definitions
//!
//! Both passes are pure functions of the definition: running them twice
//! gives the same answer and changes nothing.

pub mod schema;
pub mod structure;

pub use schema::{validate_shape, validate_value};
pub use structure::validate_structure;
