//! Core shared library for the campus administration services.
//!
//! This crate exposes reusable primitives that the services depend on:
//! common errors, configuration loading, database abstractions and
//! logging setup.

pub mod config;
pub mod db;
pub mod errors;
pub mod logging;

pub use errors::{CampusError, Result as CoreResult};
