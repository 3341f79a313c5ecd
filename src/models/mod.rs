//! Signal models and the catalogues that build them from noise-model entries.

pub mod catalogue;
pub mod signal;
pub mod standard;

pub use catalogue::*;
pub use signal::*;
pub use standard::*;
