//! Plugins and the processor they attach to.
//!
//! This module handles:
//! - The `Plugin` and `Processor` seams and a minimal in-memory `Pipeline`
//! - Named plugin registration
//! - Specifier resolution, module loading and ordered attachment

pub mod processor;
pub mod registry;
pub mod resolver;

pub use processor::{Attached, FnPlugin, Pipeline, Plugin, Processor};
pub use registry::PluginRegistry;
pub use resolver::{PluginId, PluginResolver, Resolved};
