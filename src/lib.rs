//! `enterprise-warp` library crate.
//!
//! The binary (`ewarp`) is a thin wrapper around this library so that:
//!
//! - the configuration pipeline is testable without spawning processes
//! - model catalogues and pulsar loaders can be swapped by other front-ends

pub mod app;
pub mod assemble;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
