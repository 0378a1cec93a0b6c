//! Per-file configuration resolution.
//!
//! For each target file the engine finds the config sources in its ancestor
//! directories, loads them through the shared cache, cascades them with the
//! default and override configs, and attaches the resulting plugins to a
//! processor. The engine is `Sync`; files may be resolved from several threads.

use crate::config::cache::{LoadCache, canonicalize};
use crate::config::cascade::merge_configs;
use crate::config::explorer::{discover_ignore_files, discover_sources};
use crate::config::parser::SourceLoader;
use crate::config::types::{Config, LoadedConfig, SearchSpec, Source};
use crate::error::{EngineError, LoadError, Result};
use crate::exec::{ModuleLoader, ScriptLoader};
use crate::plugin::{PluginRegistry, PluginResolver, Processor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Options for one engine run.
#[derive(Debug, Clone)]
pub struct EngineOptions {
	/// Working directory. Diagnostics show paths relative to it.
	pub cwd: PathBuf,

	/// How config sources are found.
	pub search: SearchSpec,

	/// Used only when no config source is found for a file.
	pub default_config: Option<Config>,

	/// Applied on top of everything else.
	pub overrides: Option<Config>,

	/// Registered plugins may also be referred to without this prefix.
	pub plugin_prefix: Option<String>,

	/// Name of ignore files to discover alongside config sources. Not searched
	/// when detection is off.
	pub ignore_name: Option<String>,
}

impl EngineOptions {
	/// Options searching `cwd` and its descendants with the default search.
	pub fn new(cwd: impl Into<PathBuf>) -> Self {
		let cwd = canonicalize(&cwd.into());
		EngineOptions {
			search: SearchSpec::new(&cwd),
			cwd,
			default_config: None,
			overrides: None,
			plugin_prefix: None,
			ignore_name: None,
		}
	}
}

/// Outcome of resolving one file.
#[derive(Debug)]
pub struct FileReport {
	/// The file, as given.
	pub file: PathBuf,

	/// The effective config, or why it could not be resolved.
	pub outcome: Result<Config>,
}

impl FileReport {
	pub fn is_ok(&self) -> bool {
		self.outcome.is_ok()
	}
}

/// Resolves configuration and plugins for target files.
pub struct Engine {
	options: EngineOptions,
	loader: Arc<SourceLoader>,
	configs: LoadCache<Option<Arc<Config>>>,
	resolver: PluginResolver,
}

impl Engine {
	/// Engine running script modules with the default [`ScriptLoader`].
	pub fn new(options: EngineOptions, registry: PluginRegistry) -> Self {
		Self::with_module_loader(options, registry, Arc::new(ScriptLoader::new()))
	}

	pub fn with_module_loader(
		options: EngineOptions,
		registry: PluginRegistry,
		modules: Arc<dyn ModuleLoader>,
	) -> Self {
		let loader = Arc::new(SourceLoader::new(&options.cwd, modules));
		let resolver = PluginResolver::new(&options.cwd, registry, Arc::clone(&loader))
			.with_prefix(options.plugin_prefix.clone());

		Engine {
			options,
			loader,
			configs: LoadCache::new(),
			resolver,
		}
	}

	pub fn options(&self) -> &EngineOptions {
		&self.options
	}

	/// Load every config source that applies to `file`, closest first.
	pub fn discover(&self, file: &Path) -> Result<Vec<LoadedConfig>, LoadError> {
		let dir = self.directory_of(file);
		let sources = discover_sources(&dir, &self.options.search)?;
		let given = self.options.search.fixed_path.is_some();

		let mut loaded = Vec::with_capacity(sources.len());
		for source in sources {
			let config = self
				.load_source(&source)
				.map_err(|err| if given { err.into_given() } else { err })?;
			if let Some(config) = config {
				loaded.push(LoadedConfig {
					config,
					path: source.path,
				});
			}
		}

		debug!(file = %file.display(), sources = loaded.len(), "discovered config sources");
		Ok(loaded)
	}

	/// The effective config for `file`.
	pub fn resolve(&self, file: &Path) -> Result<Config> {
		let discovered = self.discover(file)?;
		let mut config = merge_configs(
			self.options.default_config.as_ref(),
			&discovered,
			self.options.overrides.as_ref(),
			&self.resolver,
		)?;

		if let Some(ref name) = self.options.ignore_name
			&& self.options.search.detect
		{
			config.ignore_patterns = self.ignore_patterns(file, name, config.ignore_patterns)?;
		}

		Ok(config)
	}

	/// Resolve `file` and attach its plugins to `processor`.
	pub fn process(&self, file: &Path, processor: &mut dyn Processor) -> Result<Config> {
		let config = self.resolve(file)?;
		self.resolver.attach(processor, &config)?;
		Ok(config)
	}

	/// Process each file with a fresh processor. A failure only affects its own file.
	pub fn run<P, F>(&self, files: &[PathBuf], mut make_processor: F) -> Vec<FileReport>
	where
		P: Processor,
		F: FnMut() -> P,
	{
		files
			.iter()
			.map(|file| {
				let mut processor = make_processor();
				let outcome = self.process(file, &mut processor);
				if let Err(ref err) = outcome {
					debug!(file = %file.display(), error = %err, "cannot configure file");
				}
				FileReport {
					file: file.clone(),
					outcome,
				}
			})
			.collect()
	}

	fn load_source(&self, source: &Source) -> Result<Option<Arc<Config>>, LoadError> {
		self.configs.get_or_load(&source.path, |path| {
			self.loader
				.load(path, &source.format)
				.map(|config| config.map(Arc::new))
		})
	}

	/// Ignore file patterns, farthest file first, followed by `declared`.
	fn ignore_patterns(
		&self,
		file: &Path,
		name: &str,
		declared: Vec<String>,
	) -> Result<Vec<String>, EngineError> {
		let dir = self.directory_of(file);
		let mut patterns = Vec::new();
		for source in discover_ignore_files(&dir, name, &self.options.search.root)
			.iter()
			.rev()
		{
			if let Some(config) = self.load_source(source)? {
				patterns.extend(config.ignore_patterns.iter().cloned());
			}
		}
		patterns.extend(declared);
		Ok(patterns)
	}

	fn directory_of(&self, file: &Path) -> PathBuf {
		let file = self.options.cwd.join(file);
		file.parent()
			.map(canonicalize)
			.unwrap_or_else(|| self.options.cwd.clone())
	}
}
