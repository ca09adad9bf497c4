//! Parsing and validation of `kiln.toml` site configuration files.
//!
//! This crate reads the site configuration file and produces a strongly-typed
//! [`SiteConfig`]. Unknown top-level keys are kept as free-form site attributes
//! and become the attributes of the Configuration object seen by rules and
//! filters.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
