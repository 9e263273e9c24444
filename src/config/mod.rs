mod io;

pub use io::{default_config, load_from_env, load_from_file, merge, to_json, to_yaml};

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{PerfTestError, Result};

/// Root configuration: a logging-level hint and an ordered collection of
/// named tests.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub log: LoggingConfig,
	#[serde(default)]
	pub tests: BTreeMap<String, Test>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
	#[serde(default)]
	pub level: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Test {
	pub name: String,
	pub scenario: Scenario,
}

/// A `{name, config}` pair: `name` selects an executor from the registry,
/// `config` is an opaque payload that executor decodes lazily.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
	pub name: String,
	pub config: ScenarioConfig,
}

/// An opaque, raw scenario config document. Kept as `serde_json::Value`
/// rather than a typed struct so unknown fields and whole unrecognised
/// sub-trees survive a load/merge/save round trip untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioConfig(pub serde_json::Value);

impl ScenarioConfig {
	pub fn from<T: Serialize>(t: &T) -> ScenarioConfig {
		ScenarioConfig(serde_json::to_value(t).unwrap_or(serde_json::Value::Null))
	}

	pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
		serde_json::from_value(self.0.clone()).map_err(|e| PerfTestError::ConfigParse(e.to_string()))
	}
}

static PASSWORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)password\s*:\s*\S+").unwrap());
static CREDS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(creds|credentials)\s*:\s*\S+").unwrap());

impl fmt::Display for Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let raw = serde_yaml::to_string(self).unwrap_or_else(|e| format!("cannot convert to string: {e}"));
		let redacted = PASSWORD_RE.replace_all(&raw, "password: ***redacted***");
		let redacted = CREDS_RE.replace_all(&redacted, "credentials: ***redacted***");
		write!(f, "{redacted}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_redacts_password_and_creds() {
		let mut cfg = Config::default();
		cfg.tests.insert(
			"t".into(),
			Test {
				name: "t".into(),
				scenario: Scenario {
					name: "solaris.connect".into(),
					config: ScenarioConfig(serde_json::json!({"password": "hunter2", "credentials": "abc"})),
				},
			},
		);
		let rendered = cfg.to_string();
		assert!(!rendered.contains("hunter2"));
		assert!(!rendered.contains("abc"));
		assert!(rendered.contains("***redacted***"));
	}
}
