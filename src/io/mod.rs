//! Input/output helpers.
//!
//! - noise-model JSON files (`noise_model`)
//! - noise dictionaries for constant parameters (`noise_files`)
//! - parameter-name listings (`export`)

pub mod export;
pub mod noise_files;
pub mod noise_model;

pub use export::*;
pub use noise_files::*;
pub use noise_model::*;
