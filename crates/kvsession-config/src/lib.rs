//! Configuration source for the kvsession session store.
//!
//! Provides dotted-path lookups over layered TOML files:
//! - [`ConfigSource`] trait for string/number lookups with defaults
//! - [`TomlConfig`] as the file-backed implementation
//! - Config file layering (XDG user config + project-local + explicit file)
//!
//! Keys understood by the session store live in [`keys`].

pub mod discovery;
pub mod error;
pub mod keys;
pub mod source;

pub use discovery::{
    LoadedConfig, SourceLayer, load_config, load_config_file, load_config_with_options,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use source::{ConfigSource, TomlConfig};
