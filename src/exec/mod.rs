//! Executable module loading for rc-cascade.
//!
//! This module handles:
//! - The `ModuleLoader` abstraction that turns a module path into an export
//! - Running shell and node modules as child processes and reading their export from stdout
//! - Interpreter lookup on PATH

use crate::config::Config;
use crate::error::{Cause, Message};
use crate::plugin::Plugin;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

/// A zero-argument function exported by a module. Its return value is used as
/// the module's config-shaped value.
pub type Factory = Arc<dyn Fn() -> Result<Value, Cause> + Send + Sync>;

/// The value a module exports.
#[derive(Clone)]
pub enum Export {
	/// A config-shaped mapping (or anything else, which is rejected later).
	Value(Value),

	/// A ready-made config.
	Config(Config),

	/// A function producing the config-shaped mapping.
	Factory(Factory),

	/// A plugin.
	Plugin(Arc<dyn Plugin>),
}

impl fmt::Debug for Export {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Export::Value(value) => f.debug_tuple("Value").field(value).finish(),
			Export::Config(config) => f.debug_tuple("Config").field(config).finish(),
			Export::Factory(_) => f.write_str("Factory(..)"),
			Export::Plugin(plugin) => f.debug_tuple("Plugin").field(&plugin.name()).finish(),
		}
	}
}

/// Loads executable modules.
///
/// Implementations may run arbitrary code. Callers go through the load cache,
/// so each canonical path is loaded at most once per process.
pub trait ModuleLoader: Send + Sync {
	fn load(&self, path: &Path) -> Result<Export, Cause>;
}

/// Imports the module named by `RC_CASCADE_MODULE`, calls its export when it
/// is a function, and prints the result as JSON. Works for CommonJS and ES modules.
const NODE_BOOTSTRAP: &str = r#"
import { pathToFileURL } from 'node:url';
const mod = await import(pathToFileURL(process.env.RC_CASCADE_MODULE).href);
let value = mod.default !== undefined ? mod.default : { ...mod };
if (typeof value === 'function') value = await value();
process.stdout.write(JSON.stringify(value === undefined ? null : value));
"#;

/// How a module is run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpreter {
	/// `<program> <module>`. Whatever the module prints is its export.
	Script(String),

	/// Node, importing the module and printing its export.
	Node(String),
}

impl Interpreter {
	fn program(&self) -> &str {
		match self {
			Interpreter::Script(program) | Interpreter::Node(program) => program,
		}
	}
}

/// Runs modules as child processes and parses their export from stdout as JSON.
#[derive(Debug, Clone)]
pub struct ScriptLoader {
	interpreters: HashMap<String, Interpreter>,
}

impl Default for ScriptLoader {
	fn default() -> Self {
		let mut interpreters = HashMap::new();
		interpreters.insert("sh".to_string(), Interpreter::Script("sh".to_string()));
		for ext in ["js", "cjs", "mjs"] {
			interpreters.insert(ext.to_string(), Interpreter::Node("node".to_string()));
		}
		ScriptLoader { interpreters }
	}
}

impl ScriptLoader {
	pub fn new() -> Self {
		Self::default()
	}

	/// Use `interpreter` for modules with extension `ext`.
	pub fn interpreter(mut self, ext: impl Into<String>, interpreter: Interpreter) -> Self {
		self.interpreters.insert(ext.into(), interpreter);
		self
	}

	fn interpreter_for(&self, path: &Path) -> Option<&Interpreter> {
		let ext = path.extension()?.to_str()?;
		self.interpreters.get(ext)
	}
}

impl ModuleLoader for ScriptLoader {
	fn load(&self, path: &Path) -> Result<Export, Cause> {
		let interpreter = self.interpreter_for(path).ok_or_else(|| {
			Message::cause(format!("No interpreter for module `{}`", path.display()))
		})?;
		let stdout = execute_module(interpreter, path)?;
		let value: Value = serde_json::from_str(&stdout).map_err(|e| Arc::new(e) as Cause)?;
		Ok(Export::Value(value))
	}
}

/// Run `path` with `interpreter` and return its stdout.
///
/// The module runs in its own directory with `RC_CASCADE_MODULE` set to its
/// path. A non-zero exit status fails with the trimmed stderr.
pub fn execute_module(interpreter: &Interpreter, path: &Path) -> Result<String, Cause> {
	let program = resolve_command(interpreter.program()).ok_or_else(|| {
		Message::cause(format!("Interpreter not found: {}", interpreter.program()))
	})?;

	let mut cmd = Command::new(program);
	match interpreter {
		Interpreter::Script(_) => {
			cmd.arg(path);
		}
		Interpreter::Node(_) => {
			cmd.args(["--input-type=module", "-e", NODE_BOOTSTRAP]);
		}
	}
	cmd.env("RC_CASCADE_MODULE", path)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped());
	if let Some(dir) = path.parent() {
		cmd.current_dir(dir);
	}

	let output = cmd.output().map_err(|e| Arc::new(e) as Cause)?;

	if !output.status.success() {
		let stderr = String::from_utf8_lossy(&output.stderr);
		let code = output
			.status
			.code()
			.map_or_else(|| "signal".to_string(), |code| code.to_string());
		return Err(Message::cause(format!(
			"Module exited with {code}: {}",
			stderr.trim()
		)));
	}

	Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Resolve a command name to its full path.
///
/// If the command is already an absolute path, returns it as-is.
/// Otherwise, searches PATH for the command.
pub fn resolve_command(command: &str) -> Option<PathBuf> {
	let path = Path::new(command);

	if path.is_absolute() {
		return path.exists().then(|| path.to_path_buf());
	}

	let path_var = std::env::var_os("PATH")?;
	std::env::split_paths(&path_var)
		.map(|dir| dir.join(command))
		.find(|full_path| full_path.is_file())
}
