use crate::config::cache::{LoadCache, canonicalize};
use crate::config::parser::SourceLoader;
use crate::config::types::{
	Config, DATA_EXTENSIONS, MODULE_EXTENSIONS, PluginEntry, SourceFormat, Specifier,
};
use crate::error::{LoadError, PluginError};
use crate::exec::Export;
use crate::plugin::{Plugin, PluginRegistry, Processor};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Identity of a plugin for merging: two entries with the same id are the
/// same plugin however they were spelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PluginId {
	/// Canonical path of a module.
	Path(PathBuf),
	/// Registered name.
	Name(String),
	/// Address of an already loaded plugin value.
	Loaded(usize),
}

/// What a specifier turned out to be.
#[derive(Clone)]
pub enum Resolved {
	Plugin(Arc<dyn Plugin>),
	/// A config-shaped module, expanded in place by the cascade.
	Preset(Arc<Config>),
}

/// Resolves plugin specifiers and attaches plugins to a processor.
pub struct PluginResolver {
	cwd: PathBuf,
	registry: PluginRegistry,
	prefix: Option<String>,
	loader: Arc<SourceLoader>,
	modules: LoadCache<Resolved>,
}

impl PluginResolver {
	pub fn new(cwd: impl Into<PathBuf>, registry: PluginRegistry, loader: Arc<SourceLoader>) -> Self {
		PluginResolver {
			cwd: cwd.into(),
			registry,
			prefix: None,
			loader,
			modules: LoadCache::new(),
		}
	}

	/// Also try `<prefix>-<name>` for registered names.
	pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
		self.prefix = prefix;
		self
	}

	/// Work out which plugin an entry names, without loading it.
	pub fn identify(&self, entry: &PluginEntry) -> Result<PluginId, PluginError> {
		let specifier = match &entry.specifier {
			Specifier::Loaded(plugin) => {
				return Ok(PluginId::Loaded(Arc::as_ptr(plugin).cast::<()>() as usize));
			}
			Specifier::Reference(specifier) => specifier,
		};

		let base = entry.base.as_deref().unwrap_or(&self.cwd);

		if !is_path_like(specifier)
			&& let Some(name) = self.registry.lookup(specifier, self.prefix.as_deref())
		{
			return Ok(PluginId::Name(name));
		}

		find_module(&base.join(specifier))
			.map(|path| PluginId::Path(canonicalize(&path)))
			.ok_or_else(|| PluginError::NotFound {
				specifier: specifier.clone(),
				origin: self.origin(entry),
			})
	}

	/// Load what `id` refers to. Modules are loaded at most once per canonical path.
	pub fn load(&self, id: &PluginId, entry: &PluginEntry) -> Result<Resolved, PluginError> {
		let specifier = match &entry.specifier {
			Specifier::Loaded(plugin) => return Ok(Resolved::Plugin(Arc::clone(plugin))),
			Specifier::Reference(specifier) => specifier,
		};

		match id {
			PluginId::Name(name) => self
				.registry
				.get(name)
				.map(|plugin| Resolved::Plugin(Arc::clone(plugin)))
				.ok_or_else(|| PluginError::NotFound {
					specifier: specifier.clone(),
					origin: self.origin(entry),
				}),
			PluginId::Path(path) => self
				.modules
				.get_or_load(path, |canonical| self.load_module(canonical))
				.map_err(|source| PluginError::Import {
					specifier: specifier.clone(),
					origin: self.origin(entry),
					source,
				}),
			PluginId::Loaded(_) => Err(PluginError::NotFound {
				specifier: specifier.clone(),
				origin: self.origin(entry),
			}),
		}
	}

	/// Identify and load in one go.
	pub fn resolve(&self, entry: &PluginEntry) -> Result<(PluginId, Resolved), PluginError> {
		let id = self.identify(entry)?;
		let resolved = self.load(&id, entry)?;
		Ok((id, resolved))
	}

	/// Store the settings on `processor`, then register every plugin of
	/// `config` in order.
	///
	/// Expects a flattened config: presets must already be expanded.
	pub fn attach(&self, processor: &mut dyn Processor, config: &Config) -> Result<(), PluginError> {
		processor.set_data("settings", Value::Object(config.settings.clone()));

		for entry in config.plugins.iter().filter(|entry| !entry.is_disabled()) {
			let plugin = match self.resolve(entry)? {
				(_, Resolved::Plugin(plugin)) => plugin,
				(_, Resolved::Preset(_)) => {
					return Err(PluginError::ExpectedPlugin {
						specifier: entry.specifier.label(),
					});
				}
			};

			debug!(plugin = %entry.specifier.label(), "attaching plugin");
			processor
				.use_plugin(plugin, entry.options.clone())
				.map_err(|source| PluginError::Attach {
					name: entry.specifier.label(),
					source,
				})?;
		}

		Ok(())
	}

	fn load_module(&self, path: &Path) -> Result<Resolved, LoadError> {
		debug!(path = %path.display(), "loading plugin module");

		match SourceFormat::from_path(path) {
			SourceFormat::Module => match self.loader.load_export(path)? {
				Export::Plugin(plugin) => Ok(Resolved::Plugin(plugin)),
				export => self
					.loader
					.export_to_config(path, export)
					.map(|config| Resolved::Preset(Arc::new(config))),
			},
			format => {
				let config = self.loader.load(path, &format)?.unwrap_or_default();
				Ok(Resolved::Preset(Arc::new(config)))
			}
		}
	}

	fn origin(&self, entry: &PluginEntry) -> Option<PathBuf> {
		entry
			.origin
			.as_deref()
			.map(|origin| self.loader.display_path(origin))
	}
}

fn is_path_like(specifier: &str) -> bool {
	specifier.starts_with("./")
		|| specifier.starts_with("../")
		|| Path::new(specifier).is_absolute()
}

/// The file itself, or the file with one of the known source extensions added.
fn find_module(candidate: &Path) -> Option<PathBuf> {
	if candidate.is_file() {
		return Some(candidate.to_path_buf());
	}

	DATA_EXTENSIONS
		.iter()
		.chain(MODULE_EXTENSIONS)
		.map(|ext| {
			let mut path = candidate.as_os_str().to_os_string();
			path.push(format!(".{ext}"));
			PathBuf::from(path)
		})
		.find(|path| path.is_file())
}
