//! Parsing and validation of `iapfeed.toml` configuration files.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`FeedConfig`], with per-group resolution and secret lookup from the
//! environment.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_group, resolve_secret, ResolvedGroup};
pub use types::*;
