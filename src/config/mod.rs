//! Parameter-file interpreter.
//!
//! - field schema (`schema`)
//! - line parser producing global + per-model namespaces (`parser`)
//! - override / default / clone passes (`resolve`)

pub mod parser;
pub mod resolve;
pub mod schema;

pub use parser::*;
pub use resolve::*;
pub use schema::*;
