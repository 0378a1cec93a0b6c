use crate::config::types::{SearchSpec, Source, SourceFormat};
use crate::error::{LoadError, Message};
use std::path::Path;
use tracing::{debug, trace};

/// Find the config sources that apply to files in `start_dir`.
///
/// The order is:
/// 1. A fixed path, if given, is the only source (and must exist)
/// 2. With detection off, there are no sources
/// 3. Otherwise walk from `start_dir` up to `spec.root` (or the filesystem
///    root when `start_dir` is outside it). Each directory contributes the
///    first existing candidate name, then its manifest when a manifest field
///    is configured.
///
/// Returns sources closest first.
pub fn discover_sources(start_dir: &Path, spec: &SearchSpec) -> Result<Vec<Source>, LoadError> {
	if let Some(ref fixed) = spec.fixed_path {
		let path = spec.root.join(fixed);
		if !path.is_file() {
			return Err(LoadError::GivenNotFound {
				path: fixed.clone(),
				source: Message::cause(format!("No such file: {}", path.display())),
			});
		}
		debug!(path = %path.display(), "using given config file");
		return Ok(vec![Source {
			format: SourceFormat::from_path(&path),
			path,
		}]);
	}

	if !spec.detect {
		return Ok(Vec::new());
	}

	let mut sources = Vec::new();
	let mut current_dir = Some(start_dir);

	while let Some(dir) = current_dir {
		trace!(dir = %dir.display(), "searching for config");

		if let Some(path) = spec
			.names
			.iter()
			.map(|name| dir.join(name))
			.find(|path| path.is_file())
		{
			debug!(path = %path.display(), "found config file");
			sources.push(Source {
				format: SourceFormat::from_path(&path),
				path,
			});
		}

		if let Some(ref field) = spec.package_field {
			let manifest = dir.join(&spec.manifest_name);
			if manifest.is_file() {
				debug!(path = %manifest.display(), "found manifest");
				sources.push(Source {
					path: manifest,
					format: SourceFormat::Manifest(field.clone()),
				});
			}
		}

		if dir == spec.root {
			break;
		}
		current_dir = dir.parent();
	}

	Ok(sources)
}

/// Find ignore files named `name` with the same ancestor walk. Closest first.
pub fn discover_ignore_files(start_dir: &Path, name: &str, root: &Path) -> Vec<Source> {
	let spec = SearchSpec::new(root).names([name]);
	// Detection is on and there is no fixed path, so this cannot fail.
	discover_sources(start_dir, &spec)
		.unwrap_or_default()
		.into_iter()
		.map(|source| Source {
			format: SourceFormat::Ignore,
			..source
		})
		.collect()
}
