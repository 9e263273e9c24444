use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use super::Config;
use crate::errors::{PerfTestError, Result};

const ENV_PREFIX: &str = "PERFTESTS_";

/// Load and parse a config file, dispatching on its extension; an
/// unrecognised extension tries JSON first, then falls back to YAML.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
	let path = path.as_ref();
	let raw = std::fs::read_to_string(path)
		.map_err(|e| PerfTestError::Invalid(format!("cannot read config file {}: {e}", path.display())))?;
	let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
	let parsed = match ext {
		"json" => parse_json(&raw),
		"yaml" | "yml" => parse_yaml(&raw),
		_ => parse_json(&raw).or_else(|_| parse_yaml(&raw)),
	};
	parsed.map_err(|e| PerfTestError::ConfigParse(format!("cannot apply config file {}: {e}", path.display())))
}

fn parse_json(raw: &str) -> Result<Config> {
	serde_json::from_str(raw).map_err(|e| PerfTestError::ConfigParse(e.to_string()))
}

fn parse_yaml(raw: &str) -> Result<Config> {
	serde_yaml::from_str(raw).map_err(|e| PerfTestError::ConfigParse(e.to_string()))
}

/// Fold every `PERFTESTS_<PATH>` environment variable into a config tree at
/// the dotted path obtained by lower-casing and `_`-splitting `<PATH>`, then
/// decode that tree as a `Config` (unrecognised paths are silently dropped —
/// most `PERFTESTS_*` variables name scenario-level settings like
/// `PERFTESTS_SOLARIS_ADDRESS`, read directly by the steps that need them,
/// not by this top-level config).
pub fn load_from_env() -> Result<Config> {
	let mut root = serde_json::Map::new();
	for (key, value) in std::env::vars() {
		let Some(path) = key.strip_prefix(ENV_PREFIX) else { continue };
		let segments: Vec<String> = path.split('_').map(|s| s.to_lowercase()).collect();
		insert_path(&mut root, &segments, Value::String(value));
	}
	serde_json::from_value(Value::Object(root)).map_err(|e| PerfTestError::ConfigParse(e.to_string()))
}

fn insert_path(root: &mut serde_json::Map<String, Value>, segments: &[String], value: Value) {
	if segments.is_empty() {
		return;
	}
	if segments.len() == 1 {
		root.insert(segments[0].clone(), value);
		return;
	}
	let entry = root.entry(segments[0].clone()).or_insert_with(|| Value::Object(serde_json::Map::new()));
	if let Value::Object(map) = entry {
		insert_path(map, &segments[1..], value);
	}
}

/// Fill every empty property of `dest` from `src`, recursively. Scalars are
/// filled only when `dest`'s is the zero value; maps are filled key-by-key.
/// Mirrors `mergo.Merge`'s "never clobber a populated destination" default.
pub fn merge(dest: &mut Config, src: &Config) {
	if dest.log.level.is_empty() {
		dest.log.level = src.log.level.clone();
	}
	for (name, test) in &src.tests {
		dest.tests.entry(name.clone()).or_insert_with(|| test.clone());
	}
}

pub fn default_config() -> Config {
	Config { log: super::LoggingConfig { level: "info".to_string() }, tests: BTreeMap::new() }
}

pub fn to_yaml(cfg: &Config) -> Result<String> {
	serde_yaml::to_string(cfg).map_err(|e| PerfTestError::Internal(e.to_string()))
}

pub fn to_json(cfg: &Config) -> Result<String> {
	serde_json::to_string_pretty(cfg).map_err(|e| PerfTestError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{Scenario, ScenarioConfig, Test};

	#[test]
	fn merge_fills_only_empty_destination_fields() {
		let mut dest = Config { log: super::super::LoggingConfig { level: String::new() }, tests: BTreeMap::new() };
		dest.tests.insert(
			"keep".into(),
			Test { name: "keep".into(), scenario: Scenario { name: "pause".into(), config: ScenarioConfig::default() } },
		);
		let src = Config {
			log: super::super::LoggingConfig { level: "debug".into() },
			tests: BTreeMap::from([(
				"keep".to_string(),
				Test { name: "clobbered?".into(), scenario: Scenario { name: "error".into(), config: ScenarioConfig::default() } },
			), (
				"added".to_string(),
				Test { name: "added".into(), scenario: Scenario { name: "pause".into(), config: ScenarioConfig::default() } },
			)]),
		};
		merge(&mut dest, &src);
		assert_eq!(dest.log.level, "debug");
		assert_eq!(dest.tests.get("keep").unwrap().scenario.name, "pause");
		assert!(dest.tests.contains_key("added"));
	}

	#[test]
	fn env_prefix_folds_into_dotted_path() {
		std::env::set_var("PERFTESTS_LOG_LEVEL", "trace");
		let cfg = load_from_env().unwrap();
		std::env::remove_var("PERFTESTS_LOG_LEVEL");
		assert_eq!(cfg.log.level, "trace");
	}
}
