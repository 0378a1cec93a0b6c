//! Tracing subscriber initialization for the rc-cascade binary.
//!
//! Priority (highest to lowest):
//!
//! 1. `RC_CASCADE_LOG` env var (per-target directives, e.g. `rc_cascade=debug`)
//! 2. `RUST_LOG` env var
//! 3. CLI flags (`-v` → debug, `-q` → error)
//! 4. Default level: `warn`

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Verbosity level derived from CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
	Quiet,
	Normal,
	Verbose,
}

impl Verbosity {
	/// Verbose wins when both flags are given.
	pub fn from_flags(verbose: bool, quiet: bool) -> Self {
		if verbose {
			Verbosity::Verbose
		} else if quiet {
			Verbosity::Quiet
		} else {
			Verbosity::Normal
		}
	}

	fn default_level(self) -> Level {
		match self {
			Verbosity::Quiet => Level::ERROR,
			Verbosity::Normal => Level::WARN,
			Verbosity::Verbose => Level::DEBUG,
		}
	}
}

/// Install the global subscriber writing to stderr. Call once, early in `main`.
pub fn init_subscriber(verbosity: Verbosity) {
	let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());

	let fmt_layer = fmt::layer()
		.with_writer(std::io::stderr)
		.with_ansi(use_ansi)
		.with_target(true)
		.without_time()
		.compact();

	// A subscriber may already be installed when embedded; keep the existing one.
	let _ = tracing_subscriber::registry()
		.with(build_env_filter(verbosity))
		.with(fmt_layer)
		.try_init();
}

fn build_env_filter(verbosity: Verbosity) -> EnvFilter {
	if let Ok(directives) = std::env::var("RC_CASCADE_LOG")
		&& let Ok(filter) = EnvFilter::try_new(&directives)
	{
		return filter;
	}

	if let Ok(filter) = EnvFilter::try_from_default_env() {
		return filter;
	}

	EnvFilter::new(verbosity.default_level().as_str().to_ascii_lowercase())
}
