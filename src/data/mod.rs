//! Pulsar data: timing-file loading and the pulsar cache.

pub mod cache;
pub mod pulsar;

pub use cache::*;
pub use pulsar::*;
