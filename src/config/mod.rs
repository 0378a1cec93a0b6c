//! Configuration discovery, loading and merging for rc-cascade.
//!
//! This module handles:
//! - Ancestor directory search for config sources
//! - Parsing JSON, YAML, TOML, module and manifest sources into one shape
//! - Caching loads by canonical path
//! - Cascading discovered configs with defaults and overrides

pub mod cache;
pub mod cascade;
pub mod explorer;
pub mod parser;
pub mod types;

pub use cache::LoadCache;
pub use cascade::{merge_configs, merge_options, merge_settings};
pub use explorer::{discover_ignore_files, discover_sources};
pub use parser::{SourceLoader, config_from_value, parse_config_str, parse_ignore_str};
pub use types::{
	Config, LoadedConfig, PluginEntry, SearchSpec, Settings, Source, SourceFormat, Specifier,
	rc_names,
};
