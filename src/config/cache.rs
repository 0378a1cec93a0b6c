use crate::error::LoadError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::trace;

type Slot<V> = Arc<OnceLock<Result<V, LoadError>>>;

/// Memoizes loads by canonical path for the lifetime of the process.
///
/// Concurrent callers asking for the same uncached path share a single load:
/// one runs the loader, the others block until its result is stored. Failures
/// are cached too and handed out again unchanged.
pub struct LoadCache<V> {
	slots: Mutex<HashMap<PathBuf, Slot<V>>>,
}

impl<V: Clone> LoadCache<V> {
	pub fn new() -> Self {
		LoadCache {
			slots: Mutex::new(HashMap::new()),
		}
	}

	/// Return the cached result for `path`, or run `load` with the canonical path.
	///
	/// `load` must not re-enter the cache for the same path.
	pub fn get_or_load<F>(&self, path: &Path, load: F) -> Result<V, LoadError>
	where
		F: FnOnce(&Path) -> Result<V, LoadError>,
	{
		let key = canonicalize(path);

		// Only the slot lookup holds the map lock; loads of different paths run in parallel.
		let slot = {
			let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
			Arc::clone(slots.entry(key.clone()).or_default())
		};

		if slot.get().is_some() {
			trace!(path = %key.display(), "load cache hit");
		}

		slot.get_or_init(|| load(&key)).clone()
	}

	/// Whether `path` has a stored result.
	pub fn contains(&self, path: &Path) -> bool {
		let key = canonicalize(path);
		let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
		slots.get(&key).is_some_and(|slot| slot.get().is_some())
	}

	/// Number of stored results.
	pub fn len(&self) -> usize {
		let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
		slots.values().filter(|slot| slot.get().is_some()).count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<V: Clone> Default for LoadCache<V> {
	fn default() -> Self {
		Self::new()
	}
}

/// Resolve symlinks and relative components. Paths that do not exist are kept as given.
pub fn canonicalize(path: &Path) -> PathBuf {
	std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::Message;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	#[test]
	fn test_loads_once_per_path() {
		let cache = LoadCache::new();
		let calls = AtomicUsize::new(0);
		let load = |_: &Path| {
			calls.fetch_add(1, Ordering::SeqCst);
			Ok(7)
		};

		assert_eq!(cache.get_or_load(Path::new("/no/such/a"), load).unwrap(), 7);
		assert_eq!(cache.get_or_load(Path::new("/no/such/a"), load).unwrap(), 7);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(cache.contains(Path::new("/no/such/a")));
		assert_eq!(cache.len(), 1);
	}

	#[test]
	fn test_spellings_share_an_entry() {
		let temp_dir = tempfile::tempdir().unwrap();
		let nested = temp_dir.path().join("nested");
		std::fs::create_dir(&nested).unwrap();
		std::fs::write(temp_dir.path().join(".foorc"), "{}").unwrap();

		let cache = LoadCache::new();
		let calls = AtomicUsize::new(0);
		let load = |_: &Path| {
			calls.fetch_add(1, Ordering::SeqCst);
			Ok(())
		};

		cache.get_or_load(&temp_dir.path().join(".foorc"), load).unwrap();
		cache.get_or_load(&nested.join("../.foorc"), load).unwrap();
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_errors_are_cached() {
		let cache: LoadCache<()> = LoadCache::new();
		let calls = AtomicUsize::new(0);
		let load = |path: &Path| {
			calls.fetch_add(1, Ordering::SeqCst);
			Err(LoadError::Parse {
				path: path.to_path_buf(),
				source: Message::cause("bad"),
			})
		};

		let first = cache.get_or_load(Path::new("/no/such/b"), load).unwrap_err();
		let second = cache.get_or_load(Path::new("/no/such/b"), load).unwrap_err();
		assert_eq!(first.to_string(), second.to_string());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_concurrent_first_access_loads_once() {
		let cache = LoadCache::new();
		let calls = AtomicUsize::new(0);

		std::thread::scope(|scope| {
			for _ in 0..8 {
				scope.spawn(|| {
					let value = cache
						.get_or_load(Path::new("/no/such/c"), |_| {
							calls.fetch_add(1, Ordering::SeqCst);
							std::thread::sleep(Duration::from_millis(50));
							Ok("loaded".to_string())
						})
						.unwrap();
					assert_eq!(value, "loaded");
				});
			}
		});

		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}
