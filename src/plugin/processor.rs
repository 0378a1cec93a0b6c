use crate::error::Cause;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// A behavior extension attached to a [`Processor`].
pub trait Plugin: Send + Sync {
	/// Name used in diagnostics.
	fn name(&self) -> &str;

	/// Register this plugin on `processor` with its merged options.
	fn attach(&self, processor: &mut dyn Processor, options: Option<&Value>) -> Result<(), Cause>;
}

/// The pluggable processing pipeline plugins attach to.
pub trait Processor {
	/// Register a plugin with options.
	fn use_plugin(&mut self, plugin: Arc<dyn Plugin>, options: Option<Value>) -> Result<(), Cause>;

	/// Read namespaced data.
	fn data(&self, key: &str) -> Option<&Value>;

	/// Store namespaced data.
	fn set_data(&mut self, key: &str, value: Value);
}

type AttachFn = dyn Fn(&mut dyn Processor, Option<&Value>) -> Result<(), Cause> + Send + Sync;

/// A plugin backed by a closure.
pub struct FnPlugin {
	name: String,
	attach: Box<AttachFn>,
}

impl FnPlugin {
	pub fn new<F>(name: impl Into<String>, attach: F) -> Self
	where
		F: Fn(&mut dyn Processor, Option<&Value>) -> Result<(), Cause> + Send + Sync + 'static,
	{
		FnPlugin {
			name: name.into(),
			attach: Box::new(attach),
		}
	}

	/// Same as [`FnPlugin::new`], already wrapped for use in a [`PluginEntry`](crate::config::PluginEntry).
	pub fn shared<F>(name: impl Into<String>, attach: F) -> Arc<dyn Plugin>
	where
		F: Fn(&mut dyn Processor, Option<&Value>) -> Result<(), Cause> + Send + Sync + 'static,
	{
		Arc::new(Self::new(name, attach))
	}
}

impl Plugin for FnPlugin {
	fn name(&self) -> &str {
		&self.name
	}

	fn attach(&self, processor: &mut dyn Processor, options: Option<&Value>) -> Result<(), Cause> {
		(self.attach)(processor, options)
	}
}

impl fmt::Debug for FnPlugin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FnPlugin").field("name", &self.name).finish()
	}
}

/// A plugin as registered on a [`Pipeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct Attached {
	pub name: String,
	pub options: Option<Value>,
}

/// Minimal in-memory processor: keeps a data store and records attached plugins.
#[derive(Debug, Default)]
pub struct Pipeline {
	data: Map<String, Value>,
	attached: Vec<Attached>,
}

impl Pipeline {
	pub fn new() -> Self {
		Self::default()
	}

	/// Plugins in registration order.
	pub fn attached(&self) -> &[Attached] {
		&self.attached
	}
}

impl Processor for Pipeline {
	fn use_plugin(&mut self, plugin: Arc<dyn Plugin>, options: Option<Value>) -> Result<(), Cause> {
		plugin.attach(self, options.as_ref())?;
		self.attached.push(Attached {
			name: plugin.name().to_string(),
			options,
		});
		Ok(())
	}

	fn data(&self, key: &str) -> Option<&Value> {
		self.data.get(key)
	}

	fn set_data(&mut self, key: &str, value: Value) {
		self.data.insert(key.to_string(), value);
	}
}
