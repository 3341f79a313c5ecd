//! Numerical helpers for timing-model bases.

pub mod basis;

pub use basis::*;
