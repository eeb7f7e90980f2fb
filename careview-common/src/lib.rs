//! # careview common library
//!
//! Shared code for the careview dashboard service:
//! - Error types
//! - TOML configuration loading and resolution
//! - Timestamp parsing and local calendar helpers

pub mod config;
pub mod error;
pub mod time;

pub use config::{ClaimPolicy, TomlConfig};
pub use error::{Error, Result};
