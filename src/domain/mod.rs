//! Domain types used throughout the pipeline.
//!
//! - configuration values and converters (`Value`, `ValueKind`)
//! - run/model namespaces and resolved noise models (`RunConfig`, `ModelConfig`, `NoiseModel`)

pub mod types;
pub mod value;

pub use types::*;
pub use value::*;
