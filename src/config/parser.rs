use crate::config::cache::LoadCache;
use crate::config::types::{Config, PluginEntry, SourceFormat, normalize_options};
use crate::error::{Cause, LoadError, Message};
use crate::exec::{Export, ModuleLoader};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Top-level keys a config source may contain.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawConfig {
	#[serde(default)]
	settings: Option<Map<String, Value>>,

	#[serde(default)]
	plugins: Option<Value>,

	#[serde(default)]
	ignore_patterns: Option<Vec<String>>,
}

/// Parses config sources into [`Config`]s.
///
/// Module exports are memoized per canonical path, so a module reachable both
/// as a config source and as a plugin runs once.
pub struct SourceLoader {
	cwd: PathBuf,
	modules: Arc<dyn ModuleLoader>,
	exports: LoadCache<Export>,
}

impl SourceLoader {
	pub fn new(cwd: impl Into<PathBuf>, modules: Arc<dyn ModuleLoader>) -> Self {
		SourceLoader {
			cwd: cwd.into(),
			modules,
			exports: LoadCache::new(),
		}
	}

	/// Path as shown in diagnostics: relative to the working directory when inside it.
	pub fn display_path(&self, path: &Path) -> PathBuf {
		path.strip_prefix(&self.cwd)
			.map(Path::to_path_buf)
			.unwrap_or_else(|_| path.to_path_buf())
	}

	/// Load one source.
	///
	/// Returns `Ok(None)` when a manifest exists but lacks the configured field.
	pub fn load(&self, path: &Path, format: &SourceFormat) -> Result<Option<Config>, LoadError> {
		debug!(path = %path.display(), ?format, "loading config source");

		match format {
			SourceFormat::Module => {
				let export = self.load_export(path)?;
				self.export_to_config(path, export).map(Some)
			}
			SourceFormat::Manifest(field) => {
				let content = self.read(path)?;
				let manifest: Value = serde_json::from_str(&content)
					.map_err(|e| self.parse_error(path, Arc::new(e)))?;
				match manifest.get(field) {
					Some(value) => config_from_value(value.clone(), path)
						.map(Some)
						.map_err(|source| self.parse_error(path, source)),
					None => {
						debug!(path = %path.display(), field, "manifest has no config field");
						Ok(None)
					}
				}
			}
			SourceFormat::Ignore => {
				let content = self.read(path)?;
				Ok(Some(parse_ignore_str(&content)))
			}
			data => {
				let content = self.read(path)?;
				parse_config_str(&content, data, path)
					.map(Some)
					.map_err(|source| self.parse_error(path, source))
			}
		}
	}

	/// Load a module's export, running it at most once per canonical path.
	///
	/// A factory export is called here, so its result is cached with the module.
	pub fn load_export(&self, path: &Path) -> Result<Export, LoadError> {
		self.exports.get_or_load(path, |canonical| {
			debug!(path = %canonical.display(), "executing module");
			let export = match self.modules.load(canonical) {
				Ok(Export::Factory(factory)) => factory().map(Export::Value),
				other => other,
			};
			export.map_err(|source| self.parse_error(path, source))
		})
	}

	/// Turn a module export into a config.
	pub fn export_to_config(&self, path: &Path, export: Export) -> Result<Config, LoadError> {
		let config = match export {
			Export::Value(value) => config_from_value(value, path),
			Export::Factory(factory) => factory().and_then(|value| config_from_value(value, path)),
			Export::Config(config) => Ok(adopt(config, path)),
			Export::Plugin(plugin) => Err(Message::cause(format!(
				"Expected preset, not plugin `{}`",
				plugin.name()
			))),
		};
		config.map_err(|source| self.parse_error(path, source))
	}

	fn read(&self, path: &Path) -> Result<String, LoadError> {
		std::fs::read_to_string(path).map_err(|e| LoadError::Read {
			path: self.display_path(path),
			source: Arc::new(e),
		})
	}

	fn parse_error(&self, path: &Path, source: Cause) -> LoadError {
		LoadError::Parse {
			path: self.display_path(path),
			source,
		}
	}
}

/// Parse structured config text. `path` is where relative plugins resolve from.
pub fn parse_config_str(content: &str, format: &SourceFormat, path: &Path) -> Result<Config, Cause> {
	let value: Value = match format {
		SourceFormat::Yaml => serde_yaml::from_str(content).map_err(|e| Arc::new(e) as Cause)?,
		SourceFormat::Toml => toml::from_str(content).map_err(|e| Arc::new(e) as Cause)?,
		_ => serde_json::from_str(content).map_err(|e| Arc::new(e) as Cause)?,
	};
	config_from_value(value, path)
}

/// Parse an ignore file: one pattern per line, `#` comments and blanks dropped.
pub fn parse_ignore_str(content: &str) -> Config {
	let ignore_patterns = content
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty() && !line.starts_with('#'))
		.map(str::to_string)
		.collect();

	Config {
		ignore_patterns,
		..Config::default()
	}
}

/// Normalize a config-shaped value loaded from `path`.
pub fn config_from_value(value: Value, path: &Path) -> Result<Config, Cause> {
	if !value.is_object() {
		return Err(Message::cause(format!("Expected preset, not `{value}`")));
	}

	let raw: RawConfig = serde_json::from_value(value).map_err(|e| Arc::new(e) as Cause)?;
	let plugins = match raw.plugins {
		Some(plugins) => plugin_entries(plugins, path)?,
		None => Vec::new(),
	};

	Ok(Config {
		settings: raw.settings.unwrap_or_default(),
		plugins,
		ignore_patterns: raw.ignore_patterns.unwrap_or_default(),
	})
}

/// Accepts a mapping of specifier to options, or a list whose items are a
/// specifier or a `[specifier, options]` pair.
fn plugin_entries(value: Value, path: &Path) -> Result<Vec<PluginEntry>, Cause> {
	let entry = |specifier: String, options: Value| PluginEntry {
		options: normalize_options(options),
		..PluginEntry::reference(specifier).introduced_by(path)
	};

	match value {
		Value::Null => Ok(Vec::new()),
		Value::Object(map) => Ok(map
			.into_iter()
			.map(|(specifier, options)| entry(specifier, options))
			.collect()),
		Value::Array(items) => items
			.into_iter()
			.map(|item| match item {
				Value::String(specifier) => Ok(entry(specifier, Value::Null)),
				Value::Array(pair) => {
					let mut pair = pair.into_iter();
					match (pair.next(), pair.next(), pair.next()) {
						(Some(Value::String(specifier)), options, None) => {
							Ok(entry(specifier, options.unwrap_or(Value::Null)))
						}
						(first, ..) => Err(Message::cause(format!(
							"Expected plugin specifier, not `{}`",
							first.unwrap_or(Value::Null)
						))),
					}
				}
				other => Err(Message::cause(format!(
					"Expected plugin specifier, not `{other}`"
				))),
			})
			.collect(),
		other => Err(Message::cause(format!(
			"Expected a list or map of plugins, not `{other}`"
		))),
	}
}

/// Give entries of an in-process config the module's directory as their base.
fn adopt(mut config: Config, path: &Path) -> Config {
	for entry in config.plugins.iter_mut().filter(|e| e.base.is_none()) {
		entry.base = path.parent().map(Path::to_path_buf);
		entry.origin = Some(path.to_path_buf());
	}
	config
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::types::Specifier;
	use crate::exec::ScriptLoader;
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn path() -> PathBuf {
		PathBuf::from("/project/.foorc")
	}

	fn names(config: &Config) -> Vec<String> {
		config.plugins.iter().map(|e| e.specifier.label()).collect()
	}

	#[test]
	fn test_parse_empty_object() {
		let config = parse_config_str("{}", &SourceFormat::Json, &path()).unwrap();
		assert!(config.is_empty());
	}

	#[test]
	fn test_parse_empty_file_fails() {
		assert!(parse_config_str("", &SourceFormat::Json, &path()).is_err());
	}

	#[test]
	fn test_parse_settings() {
		let config =
			parse_config_str(r#"{"settings": {"foo": "bar"}}"#, &SourceFormat::Json, &path())
				.unwrap();
		assert_eq!(config.settings.get("foo"), Some(&json!("bar")));
		assert!(config.plugins.is_empty());
	}

	#[test]
	fn test_unknown_key_is_named() {
		let err = parse_config_str(r#"{"setings": {}}"#, &SourceFormat::Json, &path()).unwrap_err();
		assert!(err.to_string().contains("setings"));
	}

	#[test]
	fn test_non_object_is_rejected() {
		let err = config_from_value(json!(false), &path()).unwrap_err();
		assert_eq!(err.to_string(), "Expected preset, not `false`");
	}

	#[test]
	fn test_plugins_as_map_keep_order() {
		let config = parse_config_str(
			r#"{"plugins": {"./zeta.json": {"a": 1}, "./alpha.json": false, "beta": null}}"#,
			&SourceFormat::Json,
			&path(),
		)
		.unwrap();

		assert_eq!(names(&config), vec!["./zeta.json", "./alpha.json", "beta"]);
		assert_eq!(config.plugins[0].options, Some(json!({"a": 1})));
		assert!(config.plugins[1].is_disabled());
		assert!(config.plugins[2].options.is_none());
		assert_eq!(config.plugins[0].base, Some(PathBuf::from("/project")));
	}

	#[test]
	fn test_plugins_as_list_and_pairs() {
		let config = parse_config_str(
			r#"{"plugins": ["one", ["two", {"x": true}], ["three"]]}"#,
			&SourceFormat::Json,
			&path(),
		)
		.unwrap();

		assert_eq!(names(&config), vec!["one", "two", "three"]);
		assert_eq!(config.plugins[1].options, Some(json!({"x": true})));
		assert!(matches!(config.plugins[0].specifier, Specifier::Reference(_)));
	}

	#[test]
	fn test_invalid_plugin_specifier() {
		let err = parse_config_str(r#"{"plugins": [42]}"#, &SourceFormat::Json, &path())
			.unwrap_err();
		assert_eq!(err.to_string(), "Expected plugin specifier, not `42`");

		let err = parse_config_str(r#"{"plugins": [[1, 2]]}"#, &SourceFormat::Json, &path())
			.unwrap_err();
		assert_eq!(err.to_string(), "Expected plugin specifier, not `1`");

		let err = parse_config_str(r#"{"plugins": "one"}"#, &SourceFormat::Json, &path())
			.unwrap_err();
		assert!(err.to_string().contains("list or map"));
	}

	#[test]
	fn test_parse_yaml() {
		let content = "settings:\n  alpha: true\nplugins:\n  - ./a.json\n  - [./b.json, {level: 2}]\n";
		let config = parse_config_str(content, &SourceFormat::Yaml, &path()).unwrap();
		assert_eq!(config.settings.get("alpha"), Some(&json!(true)));
		assert_eq!(names(&config), vec!["./a.json", "./b.json"]);
	}

	#[test]
	fn test_parse_malformed_yaml() {
		assert!(parse_config_str("settings: [", &SourceFormat::Yaml, &path()).is_err());
	}

	#[test]
	fn test_parse_toml() {
		let content = r#"
ignorePatterns = ["dist/**"]

[settings]
foo = "bar"

[plugins]
"./b.json" = { level = 1 }
"./a.json" = false
"#;
		let config = parse_config_str(content, &SourceFormat::Toml, &path()).unwrap();
		assert_eq!(config.settings.get("foo"), Some(&json!("bar")));
		assert_eq!(names(&config), vec!["./b.json", "./a.json"]);
		assert!(config.plugins[1].is_disabled());
		assert_eq!(config.ignore_patterns, vec!["dist/**"]);
	}

	#[test]
	fn test_parse_ignore_str() {
		let config = parse_ignore_str("# comment\n\nnode_modules/\n  *.min.js  \n");
		assert_eq!(config.ignore_patterns, vec!["node_modules/", "*.min.js"]);
	}

	#[test]
	fn test_manifest_without_field_is_not_a_source() {
		let temp_dir = tempfile::tempdir().unwrap();
		let manifest = temp_dir.path().join("package.json");
		std::fs::write(&manifest, r#"{"name": "x"}"#).unwrap();

		let loader = SourceLoader::new(temp_dir.path(), Arc::new(ScriptLoader::new()));
		let loaded = loader
			.load(&manifest, &SourceFormat::Manifest("fooConfig".to_string()))
			.unwrap();
		assert!(loaded.is_none());
	}

	#[test]
	fn test_manifest_field_is_loaded() {
		let temp_dir = tempfile::tempdir().unwrap();
		let manifest = temp_dir.path().join("package.json");
		std::fs::write(&manifest, r#"{"fooConfig": {"settings": {"alpha": true}}}"#).unwrap();

		let loader = SourceLoader::new(temp_dir.path(), Arc::new(ScriptLoader::new()));
		let loaded = loader
			.load(&manifest, &SourceFormat::Manifest("fooConfig".to_string()))
			.unwrap()
			.unwrap();
		assert_eq!(loaded.settings.get("alpha"), Some(&json!(true)));
	}

	#[test]
	fn test_malformed_manifest_is_an_error() {
		let temp_dir = tempfile::tempdir().unwrap();
		let manifest = temp_dir.path().join("package.json");
		std::fs::write(&manifest, "{").unwrap();

		let loader = SourceLoader::new(temp_dir.path(), Arc::new(ScriptLoader::new()));
		let err = loader
			.load(&manifest, &SourceFormat::Manifest("fooConfig".to_string()))
			.unwrap_err();
		assert_eq!(err.to_string(), "Cannot parse file `package.json`");
	}

	struct FactoryLoader {
		calls: Arc<AtomicUsize>,
	}

	impl ModuleLoader for FactoryLoader {
		fn load(&self, _path: &Path) -> Result<Export, Cause> {
			let calls = Arc::clone(&self.calls);
			Ok(Export::Factory(Arc::new(move || {
				calls.fetch_add(1, Ordering::SeqCst);
				Ok(json!({"settings": {"made": true}}))
			})))
		}
	}

	#[test]
	fn test_factory_export_is_called_once() {
		let temp_dir = tempfile::tempdir().unwrap();
		let module = temp_dir.path().join(".foorc.js");
		std::fs::write(&module, "").unwrap();

		let calls = Arc::new(AtomicUsize::new(0));
		let loader = SourceLoader::new(
			temp_dir.path(),
			Arc::new(FactoryLoader {
				calls: Arc::clone(&calls),
			}),
		);

		// Once as a config source, once the way a preset is loaded.
		let config = loader.load(&module, &SourceFormat::Module).unwrap().unwrap();
		let export = loader.load_export(&module).unwrap();
		let preset = loader.export_to_config(&module, export).unwrap();

		assert_eq!(config.settings.get("made"), Some(&json!(true)));
		assert_eq!(preset.settings, config.settings);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_missing_file_is_read_error() {
		let temp_dir = tempfile::tempdir().unwrap();
		let loader = SourceLoader::new(temp_dir.path(), Arc::new(ScriptLoader::new()));
		let err = loader
			.load(&temp_dir.path().join(".foorc"), &SourceFormat::Json)
			.unwrap_err();
		assert_eq!(err.to_string(), "Cannot read file `.foorc`");
	}
}
