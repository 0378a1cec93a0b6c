use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;

use rc_cascade::config::{Config, PluginEntry};
use rc_cascade::engine::{Engine, EngineOptions};
use rc_cascade::plugin::{Pipeline, PluginRegistry};
use rc_cascade::report;

mod tracing_setup;

use tracing_setup::{Verbosity, init_subscriber};

#[derive(Parser)]
#[command(name = "rc-cascade")]
#[command(
	author,
	version,
	about = "Resolve cascading configuration and plugins for files"
)]
#[command(arg_required_else_help = true)]
struct Cli {
	/// Files to configure
	#[arg(required = true, value_name = "FILE")]
	files: Vec<PathBuf>,

	/// Search ancestor directories for rc files with this name (and its extensions)
	#[arg(long, value_name = "NAME")]
	rc_name: Option<String>,

	/// Use this config file only, skipping the search
	#[arg(long, value_name = "PATH")]
	rc_path: Option<PathBuf>,

	/// Read configuration from this field of package.json files
	#[arg(long, value_name = "FIELD")]
	package_field: Option<String>,

	/// Collect ignore patterns from files with this name
	#[arg(long, value_name = "NAME")]
	ignore_name: Option<String>,

	/// Do not search for configuration files
	#[arg(long)]
	no_config: bool,

	/// Override a setting (value is JSON, or a plain string)
	#[arg(long = "setting", short = 's', value_name = "KEY=VALUE")]
	settings: Vec<String>,

	/// Use a plugin, optionally with JSON options
	#[arg(long = "use", short = 'u', value_name = "PLUGIN[=OPTIONS]")]
	plugins: Vec<String>,

	/// Prefix tried for plugin names
	#[arg(long, value_name = "PREFIX")]
	plugin_prefix: Option<String>,

	/// Print the effective configuration of each file as JSON
	#[arg(long)]
	print_config: bool,

	/// Debug logging
	#[arg(short, long)]
	verbose: bool,

	/// Only log errors
	#[arg(short, long)]
	quiet: bool,
}

fn main() -> ExitCode {
	match run() {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:?}");
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<ExitCode> {
	let cli = Cli::parse();
	init_subscriber(Verbosity::from_flags(cli.verbose, cli.quiet));

	let cwd = std::env::current_dir().context("Failed to get current directory")?;
	let options = build_options(&cli, cwd)?;
	let engine = Engine::new(options, PluginRegistry::new());

	let cwd = &engine.options().cwd;
	let files: Vec<PathBuf> = cli.files.iter().map(|file| cwd.join(file)).collect();
	let reports = engine.run(&files, Pipeline::new);

	eprint!("{}", report::render(cwd, &reports));

	if cli.print_config {
		for report in &reports {
			if let Ok(ref config) = report.outcome {
				let rendered = serde_json::to_string_pretty(&config.to_value())
					.context("Failed to render configuration")?;
				println!("# {}\n{}", report.file.display(), rendered);
			}
		}
	}

	if report::failures(&reports) > 0 {
		Ok(ExitCode::FAILURE)
	} else {
		Ok(ExitCode::SUCCESS)
	}
}

fn build_options(cli: &Cli, cwd: PathBuf) -> Result<EngineOptions> {
	let mut options = EngineOptions::new(cwd);

	let mut search = options.search.clone().detect(!cli.no_config);
	if let Some(ref name) = cli.rc_name {
		search = search.rc_name(name);
	}
	if let Some(ref path) = cli.rc_path {
		search = search.fixed_path(path);
	}
	if let Some(ref field) = cli.package_field {
		search = search.package_field(field);
	}
	options.search = search;

	options.overrides = parse_overrides(&cli.settings, &cli.plugins)?;
	options.plugin_prefix = cli.plugin_prefix.clone();
	options.ignore_name = cli.ignore_name.clone();

	Ok(options)
}

/// Build the override config from `--setting` and `--use` flags.
fn parse_overrides(settings: &[String], plugins: &[String]) -> Result<Option<Config>> {
	if settings.is_empty() && plugins.is_empty() {
		return Ok(None);
	}

	let mut config = Config::default();

	for setting in settings {
		let Some((key, value)) = setting.split_once('=') else {
			bail!("Invalid setting `{setting}`, expected KEY=VALUE");
		};
		let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
		config = config.with_setting(key.trim(), value);
	}

	for plugin in plugins {
		let entry = match plugin.split_once('=') {
			Some((specifier, options)) => {
				let options: Value = serde_json::from_str(options)
					.with_context(|| format!("Invalid options for plugin `{specifier}`"))?;
				PluginEntry::reference(specifier).with_options(options)
			}
			None => PluginEntry::reference(plugin.as_str()),
		};
		config = config.with_plugin(entry);
	}

	Ok(Some(config))
}
