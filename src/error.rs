use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shareable underlying cause.
///
/// Causes are reference counted so a cached failure can be handed to every
/// caller that asks for the same source.
pub type Cause = Arc<dyn std::error::Error + Send + Sync>;

/// A plain message used as an underlying cause.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Message(pub String);

impl Message {
	/// Wrap a message into a [`Cause`].
	pub fn cause(message: impl Into<String>) -> Cause {
		Arc::new(Message(message.into()))
	}
}

/// A configuration source could not be found, read or parsed, or it violates
/// the config schema.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
	#[error("Cannot read given file `{}`", .path.display())]
	GivenNotFound {
		path: PathBuf,
		#[source]
		source: Cause,
	},

	#[error("Cannot parse given file `{}`", .path.display())]
	GivenParse {
		path: PathBuf,
		#[source]
		source: Cause,
	},

	#[error("Cannot read file `{}`", .path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: Cause,
	},

	#[error("Cannot parse file `{}`", .path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: Cause,
	},
}

impl LoadError {
	/// The source path as shown to the user.
	pub fn path(&self) -> &Path {
		match self {
			LoadError::GivenNotFound { path, .. }
			| LoadError::GivenParse { path, .. }
			| LoadError::Read { path, .. }
			| LoadError::Parse { path, .. } => path,
		}
	}

	/// Re-attribute a failure to an explicitly requested source.
	pub fn into_given(self) -> Self {
		match self {
			LoadError::Read { path, source } => LoadError::GivenNotFound { path, source },
			LoadError::Parse { path, source } => LoadError::GivenParse { path, source },
			given => given,
		}
	}
}

/// A plugin specifier could not be resolved or loaded, or the plugin failed
/// while being registered.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
	#[error("Cannot find plugin `{specifier}`{}", from_origin(.origin))]
	NotFound {
		specifier: String,
		origin: Option<PathBuf>,
	},

	#[error("Cannot import `{specifier}`{}", from_origin(.origin))]
	Import {
		specifier: String,
		origin: Option<PathBuf>,
		#[source]
		source: LoadError,
	},

	#[error("Expected plugin, not preset `{specifier}`")]
	ExpectedPlugin { specifier: String },

	#[error("Preset `{specifier}` includes itself")]
	PresetCycle { specifier: String },

	#[error("Cannot attach plugin `{name}`")]
	Attach {
		name: String,
		#[source]
		source: Cause,
	},
}

fn from_origin(origin: &Option<PathBuf>) -> String {
	match origin {
		Some(path) => format!(" from `{}`", path.display()),
		None => String::new(),
	}
}

/// Failure resolving the configuration of one file.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	#[error(transparent)]
	Load(#[from] LoadError),

	#[error(transparent)]
	Plugin(#[from] PluginError),
}

impl EngineError {
	/// Name of the error kind as shown in diagnostics.
	pub fn kind(&self) -> &'static str {
		match self {
			EngineError::Load(_) => "LoadError",
			EngineError::Plugin(_) => "PluginError",
		}
	}

	/// Outer message followed by every nested cause, outermost first.
	pub fn causes(&self) -> Vec<String> {
		let mut causes = vec![self.to_string()];
		let mut next = std::error::Error::source(self);
		while let Some(cause) = next {
			causes.push(cause.to_string());
			next = cause.source();
		}
		causes
	}
}

/// Result type alias using EngineError.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
