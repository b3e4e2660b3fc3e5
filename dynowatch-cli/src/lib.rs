//! dynowatch CLI library
//!
//! The `dynowatch` binary is a thin wrapper over these modules; they are
//! exposed as a library so integration tests can drive config loading and
//! rendering directly.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
