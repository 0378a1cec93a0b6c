use crate::config::types::{Config, LoadedConfig, PluginEntry, Settings};
use crate::error::PluginError;
use crate::plugin::resolver::{PluginId, PluginResolver, Resolved};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, trace};

/// Merge the configs that apply to one file into a single effective config.
///
/// Layers, lowest priority first:
/// 1. `default_config`, only when nothing was discovered
/// 2. `discovered`, farthest first (the slice is closest first)
/// 3. `overrides`
///
/// Settings merge key by key, higher layers winning. Plugins are concatenated
/// and deduplicated by identity: a repeated plugin keeps its first position and
/// its options are merged. A plugin disabled (options `false`) anywhere is
/// dropped. Presets are expanded in place.
pub fn merge_configs(
	default_config: Option<&Config>,
	discovered: &[LoadedConfig],
	overrides: Option<&Config>,
	resolver: &PluginResolver,
) -> Result<Config, PluginError> {
	let mut layers: Vec<&Config> = Vec::new();
	if discovered.is_empty() {
		layers.extend(default_config);
	} else {
		layers.extend(discovered.iter().rev().map(|loaded| loaded.config.as_ref()));
	}
	layers.extend(overrides);

	debug!(layers = layers.len(), "merging configs");

	// Collect disabled plugins up front so they are never loaded.
	let mut disabled = HashSet::new();
	for layer in &layers {
		for entry in layer.plugins.iter().filter(|entry| entry.is_disabled()) {
			if let Ok(id) = resolver.identify(entry) {
				disabled.insert(id);
			}
		}
	}

	let mut merged = Config::default();
	let mut slots: Vec<(PluginId, PluginEntry)> = Vec::new();

	for layer in layers {
		let mut expanded = Expanded::default();
		expand(layer, resolver, &mut disabled, &mut Vec::new(), &mut expanded)?;

		merge_settings(&mut merged.settings, &expanded.settings);
		for (id, entry) in expanded.entries {
			add_entry(&mut slots, id, entry);
		}
		merged
			.ignore_patterns
			.extend(layer.ignore_patterns.iter().cloned());
	}

	merged.plugins = slots
		.into_iter()
		.filter(|(id, _)| !disabled.contains(id))
		.map(|(_, entry)| entry)
		.collect();

	Ok(merged)
}

#[derive(Default)]
struct Expanded {
	settings: Settings,
	entries: Vec<(PluginId, PluginEntry)>,
}

/// Flatten one layer: presets contribute their settings (beneath the layer's
/// own) and their plugins (at the preset's position).
fn expand(
	config: &Config,
	resolver: &PluginResolver,
	disabled: &mut HashSet<PluginId>,
	presets: &mut Vec<PluginId>,
	out: &mut Expanded,
) -> Result<(), PluginError> {
	for entry in &config.plugins {
		if entry.is_disabled() {
			if let Ok(id) = resolver.identify(entry) {
				disabled.insert(id);
			}
			continue;
		}

		let id = resolver.identify(entry)?;
		if disabled.contains(&id) {
			trace!(plugin = %entry.specifier.label(), "skipping disabled plugin");
			continue;
		}

		match resolver.load(&id, entry)? {
			Resolved::Plugin(_) => out.entries.push((id, entry.clone())),
			Resolved::Preset(preset) => {
				if presets.contains(&id) {
					return Err(PluginError::PresetCycle {
						specifier: entry.specifier.label(),
					});
				}
				debug!(preset = %entry.specifier.label(), "expanding preset");

				presets.push(id);
				let mut inner = Expanded::default();
				expand(&preset, resolver, disabled, presets, &mut inner)?;
				presets.pop();

				merge_settings(&mut out.settings, &inner.settings);
				out.entries.extend(inner.entries);
			}
		}
	}

	merge_settings(&mut out.settings, &config.settings);
	Ok(())
}

fn add_entry(slots: &mut Vec<(PluginId, PluginEntry)>, id: PluginId, entry: PluginEntry) {
	match slots.iter_mut().find(|(existing, _)| *existing == id) {
		Some((_, slot)) => slot.options = merge_options(slot.options.take(), entry.options),
		None => slots.push((id, entry)),
	}
}

/// Shallow merge: keys of `layer` overwrite keys of `target`.
pub fn merge_settings(target: &mut Settings, layer: &Settings) {
	for (key, value) in layer {
		target.insert(key.clone(), value.clone());
	}
}

/// Merge plugin options: two mappings merge like settings, otherwise the
/// higher option replaces the lower one, and a missing higher option keeps
/// the lower one.
pub fn merge_options(lower: Option<Value>, higher: Option<Value>) -> Option<Value> {
	match (lower, higher) {
		(Some(Value::Object(mut lower)), Some(Value::Object(higher))) => {
			merge_settings(&mut lower, &higher);
			Some(Value::Object(lower))
		}
		(lower, None) => lower,
		(_, higher) => higher,
	}
}
