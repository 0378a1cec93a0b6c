use crate::plugin::Plugin;
use std::collections::HashMap;
use std::sync::Arc;

/// Plugins known by name, supplied by the host.
#[derive(Clone, Default)]
pub struct PluginRegistry {
	plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register `plugin` under `name`, replacing any previous registration.
	pub fn register(&mut self, name: impl Into<String>, plugin: Arc<dyn Plugin>) -> &mut Self {
		self.plugins.insert(name.into(), plugin);
		self
	}

	pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
		self.plugins.get(name)
	}

	/// Find `name`, then `<prefix>-<name>`. Returns the registered name.
	pub fn lookup(&self, name: &str, prefix: Option<&str>) -> Option<String> {
		if self.plugins.contains_key(name) {
			return Some(name.to_string());
		}

		let prefix = prefix?;
		let prefixed = format!("{prefix}-{name}");
		self.plugins.contains_key(&prefixed).then_some(prefixed)
	}

	pub fn len(&self) -> usize {
		self.plugins.len()
	}

	pub fn is_empty(&self) -> bool {
		self.plugins.is_empty()
	}
}

impl std::fmt::Debug for PluginRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut names: Vec<_> = self.plugins.keys().collect();
		names.sort();
		f.debug_struct("PluginRegistry").field("plugins", &names).finish()
	}
}
