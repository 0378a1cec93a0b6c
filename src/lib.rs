//! rc-cascade - configuration discovery and plugin cascading for file-processing pipelines.
//!
//! This library provides:
//! - Config source discovery in a file's ancestor directories
//! - Loading JSON, YAML, TOML, executable modules and manifest fields into one config shape
//! - A load cache that runs each source at most once, even under concurrent access
//! - Cascading of defaults, discovered configs and overrides into one effective config
//! - Plugin resolution and ordered attachment to a processor
//!
//! # Example
//!
//! ```no_run
//! use rc_cascade::engine::{Engine, EngineOptions};
//! use rc_cascade::plugin::{Pipeline, PluginRegistry};
//! use std::path::Path;
//!
//! let cwd = std::env::current_dir().unwrap();
//! let mut options = EngineOptions::new(&cwd);
//! options.search = options.search.rc_name(".foorc").package_field("fooConfig");
//!
//! let engine = Engine::new(options, PluginRegistry::new());
//! let mut pipeline = Pipeline::new();
//! let config = engine.process(Path::new("one.txt"), &mut pipeline).unwrap();
//!
//! println!("settings: {:?}", config.settings);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod plugin;
pub mod report;

pub use error::{EngineError, LoadError, PluginError, Result};
