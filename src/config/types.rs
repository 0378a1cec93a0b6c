use crate::plugin::Plugin;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Processor-level settings. Opaque to this crate, merged key by key.
pub type Settings = Map<String, Value>;

/// Normalized configuration, as loaded from one source or produced by the
/// cascade.
#[derive(Debug, Clone, Default)]
pub struct Config {
	/// Settings handed to the processor.
	pub settings: Settings,

	/// Plugins in attach order.
	pub plugins: Vec<PluginEntry>,

	/// Ignore patterns, passed through uninterpreted.
	pub ignore_patterns: Vec<String>,
}

impl Config {
	/// True for the identity config (nothing to merge).
	pub fn is_empty(&self) -> bool {
		self.settings.is_empty() && self.plugins.is_empty() && self.ignore_patterns.is_empty()
	}

	/// Add a plugin entry.
	pub fn with_plugin(mut self, entry: PluginEntry) -> Self {
		self.plugins.push(entry);
		self
	}

	/// Set one setting.
	pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
		self.settings.insert(key.into(), value);
		self
	}

	/// JSON rendering, in the same shape a config file uses.
	pub fn to_value(&self) -> Value {
		let plugins = self
			.plugins
			.iter()
			.map(|entry| {
				let options = entry.options.clone().unwrap_or(Value::Null);
				Value::Array(vec![Value::String(entry.specifier.label()), options])
			})
			.collect();

		let mut value = Map::new();
		value.insert("settings".to_string(), Value::Object(self.settings.clone()));
		value.insert("plugins".to_string(), Value::Array(plugins));
		if !self.ignore_patterns.is_empty() {
			value.insert(
				"ignorePatterns".to_string(),
				self.ignore_patterns.iter().cloned().map(Value::String).collect(),
			);
		}
		Value::Object(value)
	}
}

/// What a plugin entry refers to.
#[derive(Clone)]
pub enum Specifier {
	/// A module reference: a registered name, or a relative or absolute path.
	Reference(String),

	/// A plugin value that is already loaded. Never re-resolved.
	Loaded(Arc<dyn Plugin>),
}

impl Specifier {
	/// Human readable form for diagnostics.
	pub fn label(&self) -> String {
		match self {
			Specifier::Reference(reference) => reference.clone(),
			Specifier::Loaded(plugin) => plugin.name().to_string(),
		}
	}
}

impl fmt::Debug for Specifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Specifier::Reference(reference) => f.debug_tuple("Reference").field(reference).finish(),
			Specifier::Loaded(plugin) => f.debug_tuple("Loaded").field(&plugin.name()).finish(),
		}
	}
}

/// One plugin with its options.
#[derive(Debug, Clone)]
pub struct PluginEntry {
	pub specifier: Specifier,

	/// Plugin options. `Some(false)` disables the plugin everywhere.
	pub options: Option<Value>,

	/// Directory relative references resolve against.
	pub base: Option<PathBuf>,

	/// Config source that introduced this entry.
	pub origin: Option<PathBuf>,
}

impl PluginEntry {
	/// Entry referring to a module by name or path.
	pub fn reference(specifier: impl Into<String>) -> Self {
		Self::new(Specifier::Reference(specifier.into()))
	}

	/// Entry for an already loaded plugin.
	pub fn loaded(plugin: Arc<dyn Plugin>) -> Self {
		Self::new(Specifier::Loaded(plugin))
	}

	fn new(specifier: Specifier) -> Self {
		PluginEntry {
			specifier,
			options: None,
			base: None,
			origin: None,
		}
	}

	/// Attach options. `null` and `true` mean "enabled without options".
	pub fn with_options(mut self, options: Value) -> Self {
		self.options = normalize_options(options);
		self
	}

	/// Record where this entry came from.
	pub fn introduced_by(mut self, origin: &Path) -> Self {
		self.base = origin.parent().map(Path::to_path_buf);
		self.origin = Some(origin.to_path_buf());
		self
	}

	/// Whether the options are the disable sentinel.
	pub fn is_disabled(&self) -> bool {
		matches!(self.options, Some(Value::Bool(false)))
	}
}

pub(crate) fn normalize_options(options: Value) -> Option<Value> {
	match options {
		Value::Null | Value::Bool(true) => None,
		other => Some(other),
	}
}

/// How a config source is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceFormat {
	Json,
	Yaml,
	Toml,
	/// Executable module, loaded through a [`ModuleLoader`](crate::exec::ModuleLoader).
	Module,
	/// A field of a package manifest. The field name is carried along.
	Manifest(String),
	/// Line based ignore file.
	Ignore,
}

/// Extensions of executable modules.
pub const MODULE_EXTENSIONS: &[&str] = &["sh", "js", "cjs", "mjs"];

/// Extensions of structured data sources.
pub const DATA_EXTENSIONS: &[&str] = &["json", "toml", "yaml", "yml"];

impl SourceFormat {
	/// Infer the format from a file name. Unknown or missing extensions are JSON.
	pub fn from_path(path: &Path) -> Self {
		let extension = path
			.extension()
			.and_then(|ext| ext.to_str())
			.map(str::to_ascii_lowercase);

		match extension.as_deref() {
			Some("yaml" | "yml") => SourceFormat::Yaml,
			Some("toml") => SourceFormat::Toml,
			Some(ext) if MODULE_EXTENSIONS.contains(&ext) => SourceFormat::Module,
			_ => SourceFormat::Json,
		}
	}
}

/// A discovered config source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
	pub path: PathBuf,
	pub format: SourceFormat,
}

/// Where and how to look for config sources. Immutable per invocation.
#[derive(Debug, Clone)]
pub struct SearchSpec {
	/// Candidate file names, highest priority first. At most one matches per directory.
	pub names: Vec<String>,

	/// Manifest field holding configuration, if manifests are searched.
	pub package_field: Option<String>,

	/// Manifest file name.
	pub manifest_name: String,

	/// A single source that bypasses the search. Relative to `root`.
	pub fixed_path: Option<PathBuf>,

	/// Whether to search ancestor directories at all.
	pub detect: bool,

	/// Last directory searched (usually the working directory).
	pub root: PathBuf,
}

impl SearchSpec {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		SearchSpec {
			names: Vec::new(),
			package_field: None,
			manifest_name: "package.json".to_string(),
			fixed_path: None,
			detect: true,
			root: root.into(),
		}
	}

	/// Search the usual family of rc files for `name`.
	pub fn rc_name(mut self, name: &str) -> Self {
		self.names = rc_names(name);
		self
	}

	pub fn names<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.names = names.into_iter().map(Into::into).collect();
		self
	}

	pub fn package_field(mut self, field: impl Into<String>) -> Self {
		self.package_field = Some(field.into());
		self
	}

	pub fn manifest_name(mut self, name: impl Into<String>) -> Self {
		self.manifest_name = name.into();
		self
	}

	pub fn fixed_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.fixed_path = Some(path.into());
		self
	}

	pub fn detect(mut self, detect: bool) -> Self {
		self.detect = detect;
		self
	}
}

/// Candidate file names for an rc name, in priority order.
pub fn rc_names(name: &str) -> Vec<String> {
	let mut names = vec![name.to_string()];
	names.extend(
		DATA_EXTENSIONS
			.iter()
			.chain(MODULE_EXTENSIONS)
			.map(|ext| format!("{name}.{ext}")),
	);
	names
}

/// A loaded configuration with its source path.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
	/// The parsed configuration.
	pub config: Arc<Config>,

	/// The path this config was loaded from.
	pub path: PathBuf,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_format_from_path() {
		assert_eq!(SourceFormat::from_path(Path::new(".foorc")), SourceFormat::Json);
		assert_eq!(
			SourceFormat::from_path(Path::new(".foorc.json")),
			SourceFormat::Json
		);
		assert_eq!(
			SourceFormat::from_path(Path::new(".foorc.yml")),
			SourceFormat::Yaml
		);
		assert_eq!(
			SourceFormat::from_path(Path::new("dir/.foorc.toml")),
			SourceFormat::Toml
		);
		assert_eq!(
			SourceFormat::from_path(Path::new(".foorc.mjs")),
			SourceFormat::Module
		);
		assert_eq!(
			SourceFormat::from_path(Path::new(".foorc.sh")),
			SourceFormat::Module
		);
	}

	#[test]
	fn test_rc_names_priority() {
		let names = rc_names(".foorc");
		assert_eq!(names[0], ".foorc");
		assert_eq!(names[1], ".foorc.json");
		assert!(names.contains(&".foorc.yaml".to_string()));
		assert_eq!(names.last().map(String::as_str), Some(".foorc.mjs"));
	}

	#[test]
	fn test_options_normalization() {
		let entry = PluginEntry::reference("a").with_options(json!(true));
		assert!(entry.options.is_none());
		assert!(!entry.is_disabled());

		let entry = PluginEntry::reference("a").with_options(json!(false));
		assert!(entry.is_disabled());

		let entry = PluginEntry::reference("a").with_options(json!({"x": 1}));
		assert_eq!(entry.options, Some(json!({"x": 1})));
	}

	#[test]
	fn test_introduced_by_sets_base() {
		let entry = PluginEntry::reference("./x.json").introduced_by(Path::new("/p/q/.foorc"));
		assert_eq!(entry.base, Some(PathBuf::from("/p/q")));
		assert_eq!(entry.origin, Some(PathBuf::from("/p/q/.foorc")));
	}
}
