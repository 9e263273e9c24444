use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};

use crate::config::{self, Config, Scenario, ScenarioConfig, Test};
use crate::metrics::MetricKind;

#[derive(Parser)]
#[command(name = "perftests", about = "Distributed performance-test harness for the log service")]
pub struct Cli {
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
	/// Starts the service: perftests start {cfg_file_names}...
	Start {
		#[arg(required = true)]
		configs: Vec<PathBuf>,
	},
	/// Emits the built-in default config: perftests defaultCfg perftests.yaml
	DefaultCfg {
		/// destination file, or "-" for stdout
		path: String,
	},
	/// Synthesizes a scenario config for a canned workload: perftests
	/// generateCfg perftests.yaml append 10 1048576 1 1 1024
	GenerateCfg {
		/// destination file, "-" for stdout, or "auto" to derive a name from op and params
		path: String,
		/// one of: sleep, append, cleanup
		op: String,
		#[arg(trailing_var_arg = true, allow_hyphen_values = true)]
		params: Vec<i64>,
	},
	Version,
}

/// Loads the environment config, then merges each file argument on top (a
/// later file fills only what's still empty), then fills any remaining gaps
/// from the built-in default. Mirrors the original's env → files → defaults
/// merge order.
pub fn load_start_config(paths: &[PathBuf]) -> anyhow::Result<Config> {
	let mut app_cfg = config::load_from_env().context("failed to load config from environment")?;
	for path in paths {
		let file_cfg = config::load_from_file(path).with_context(|| format!("failed to load config file {}", path.display()))?;
		config::merge(&mut app_cfg, &file_cfg);
	}
	config::merge(&mut app_cfg, &config::default_config());
	Ok(app_cfg)
}

pub fn default_cfg(path: &str) -> anyhow::Result<()> {
	let cfg = config::default_config();
	write_cfg(path, &cfg)
}

/// Synthesizes a config for one of the canned workloads and writes it to
/// `path` ("-" for stdout, "auto" to derive a file name from `op` and
/// `params`).
pub fn generate_cfg(path: &str, op: &str, params: &[i64]) -> anyhow::Result<()> {
	let cfg = synthesize_config(op, params)?;
	let path = if path == "auto" { auto_path(op, params) } else { path.to_string() };
	write_cfg(&path, &cfg)
}

fn write_cfg(path: &str, cfg: &Config) -> anyhow::Result<()> {
	let yaml = config::to_yaml(cfg)?;
	if path == "-" {
		println!("Config:");
		print!("{yaml}");
	} else {
		println!("write the config to {path}");
		let mut f = std::fs::File::create(path).with_context(|| format!("cannot create {path}"))?;
		f.write_all(yaml.as_bytes())?;
	}
	Ok(())
}

fn auto_path(op: &str, params: &[i64]) -> String {
	let mut name = op.to_string();
	for p in params {
		name.push('_');
		name.push_str(&p.to_string());
	}
	name.push_str(".yaml");
	name
}

fn synthesize_config(op: &str, params: &[i64]) -> anyhow::Result<Config> {
	let test = match op {
		"sleep" => sleep_test(params)?,
		"append" => append_test(params)?,
		"cleanup" => cleanup_test(params)?,
		other => bail!("unknown generateCfg op {other}, expected one of: sleep, append, cleanup"),
	};
	let mut cfg = config::default_config();
	cfg.tests.insert("main".to_string(), test);
	Ok(cfg)
}

/// `sleep <millis>`: a single pause of the given duration.
fn sleep_test(params: &[i64]) -> anyhow::Result<Test> {
	let [millis] = *params else { bail!("sleep takes 1 param: millis, got {}", params.len()) };
	Ok(Test {
		name: format!("Sleep for {millis}ms"),
		scenario: Scenario {
			name: crate::runner::pause::NAME.to_string(),
			config: ScenarioConfig::from(&crate::runner::pause::PauseCfg { value: format!("{millis}ms") }),
		},
	})
}

/// `cleanup`: joins the cluster (by run-ID) and immediately tears it down —
/// used to reclaim a run's cluster/node logs after a crashed test.
fn cleanup_test(params: &[i64]) -> anyhow::Result<Test> {
	if !params.is_empty() {
		bail!("cleanup takes no params, got {}", params.len());
	}
	Ok(Test {
		name: "Cleanup cluster".to_string(),
		scenario: Scenario {
			name: crate::runner::sequence::NAME.to_string(),
			config: ScenarioConfig::from(&crate::runner::sequence::SequenceCfg {
				steps: vec![
					Scenario {
						name: crate::cluster::steps::connect::NAME.to_string(),
						config: ScenarioConfig::from(&crate::cluster::steps::connect::ConnectCfg::default()),
					},
					Scenario {
						name: crate::cluster::steps::delete::NAME.to_string(),
						config: ScenarioConfig::from(&crate::cluster::steps::delete::DeleteCfg::default()),
					},
				],
				..Default::default()
			}),
		},
	})
}

/// `append <concurrentLogs> <logSize> <writersPerLog> <batchSize>
/// <messageSize>`: `concurrentLogs` logs are driven in parallel, each
/// through create → `writersPerLog` sequential appends of `batchSize`
/// records of `messageSize` bytes → a single query covering the log's
/// `logSize` records → delete, wrapped by a cluster rendezvous so every
/// participating node's metrics are merged at the end.
fn append_test(params: &[i64]) -> anyhow::Result<Test> {
	let [concurrent_logs, log_size, writers_per_log, batch_size, message_size] = *params else {
		bail!("append takes 5 params: concurrentLogs logSize writersPerLog batchSize messageSize, got {}", params.len())
	};

	const APPEND_TIMEOUT_METRIC: &str = "appendTOs";
	const APPEND_MSGS_RATE_METRIC: &str = "appendMsgsRate";
	const APPEND_BYTES_RATE_METRIC: &str = "appendBytesRate";
	const QUERY_TIMEOUT_METRIC: &str = "seqQueryTOs";

	let per_log = Scenario {
		name: crate::runner::sequence::NAME.to_string(),
		config: ScenarioConfig::from(&crate::runner::sequence::SequenceCfg {
			steps: vec![
				Scenario {
					name: crate::log_service::steps::create_log::NAME.to_string(),
					config: ScenarioConfig::from(&crate::log_service::steps::create_log::CreateLogCfg::default()),
				},
				Scenario {
					name: crate::log_service::steps::append::NAME.to_string(),
					config: ScenarioConfig::from(&crate::log_service::steps::append::AppendCfg {
						message_size: message_size as usize,
						batch_size: batch_size as usize,
						number: writers_per_log,
						timeout_metric_name: APPEND_TIMEOUT_METRIC.to_string(),
						msgs_rate_metric_name: APPEND_MSGS_RATE_METRIC.to_string(),
						bytes_rate_metric_name: APPEND_BYTES_RATE_METRIC.to_string(),
					}),
				},
				Scenario {
					name: crate::log_service::steps::seq_query::NAME.to_string(),
					config: ScenarioConfig::from(&crate::log_service::steps::seq_query::SeqQueryMsgsCfg {
						step: log_size,
						number: 1,
						timeout_metric_name: QUERY_TIMEOUT_METRIC.to_string(),
						..Default::default()
					}),
				},
				Scenario {
					name: crate::log_service::steps::delete_log::NAME.to_string(),
					config: ScenarioConfig::from(&crate::log_service::steps::delete_log::DeleteLogCfg::default()),
				},
			],
			..Default::default()
		}),
	};

	let metric_names = vec![APPEND_TIMEOUT_METRIC.to_string(), APPEND_MSGS_RATE_METRIC.to_string(), APPEND_BYTES_RATE_METRIC.to_string(), QUERY_TIMEOUT_METRIC.to_string()];

	let body = Scenario {
		name: crate::runner::sequence::NAME.to_string(),
		config: ScenarioConfig::from(&crate::runner::sequence::SequenceCfg {
			steps: vec![
				Scenario {
					name: crate::log_service::steps::connect::NAME.to_string(),
					config: ScenarioConfig::from(&crate::log_service::steps::connect::ConnectCfg::default()),
				},
				Scenario {
					name: crate::runner::metrics_create::NAME.to_string(),
					config: ScenarioConfig::from(&crate::runner::metrics_create::MetricsCreateCfg {
						metrics: std::collections::BTreeMap::from([
							(MetricKind::Duration, vec![APPEND_TIMEOUT_METRIC.to_string(), QUERY_TIMEOUT_METRIC.to_string()]),
							(MetricKind::Rps, vec![APPEND_MSGS_RATE_METRIC.to_string(), APPEND_BYTES_RATE_METRIC.to_string()]),
						]),
					}),
				},
				Scenario {
					name: crate::runner::repeat::NAME.to_string(),
					config: ScenarioConfig::from(&crate::runner::repeat::RepeatCfg {
						executor: crate::runner::parallel::NAME.to_string(),
						count: concurrent_logs as usize,
						skip_errors: false,
						period: String::new(),
						action: per_log,
					}),
				},
				Scenario {
					name: crate::runner::metrics_fix::NAME.to_string(),
					config: ScenarioConfig::from(&crate::runner::metrics_fix::MetricsFixCfg { metrics: metric_names.clone() }),
				},
			],
			..Default::default()
		}),
	};

	Ok(Test {
		name: format!("Append to {concurrent_logs} logs"),
		scenario: Scenario {
			name: crate::runner::sequence::NAME.to_string(),
			config: ScenarioConfig::from(&crate::runner::sequence::SequenceCfg {
				steps: vec![
					Scenario {
						name: crate::cluster::steps::connect::NAME.to_string(),
						config: ScenarioConfig::from(&crate::cluster::steps::connect::ConnectCfg::default()),
					},
					body,
					Scenario {
						name: crate::cluster::steps::finish::NAME.to_string(),
						config: ScenarioConfig::from(&crate::cluster::steps::finish::FinishCfg { metrics: metric_names, wait_for_peers: true }),
					},
					Scenario {
						name: crate::cluster::steps::delete::NAME.to_string(),
						config: ScenarioConfig::from(&crate::cluster::steps::delete::DeleteCfg::default()),
					},
				],
				..Default::default()
			}),
		},
	})
}

pub fn print_version() {
	println!("perftests {}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn append_op_produces_the_documented_scenario_tree() {
		let test = append_test(&[10, 1048576, 1, 1, 1024]).unwrap();
		assert!(test.name.starts_with("Append to 10 logs"));

		let outer: crate::runner::sequence::SequenceCfg = test.scenario.config.decode().unwrap();
		let step_names: Vec<&str> = outer.steps.iter().map(|s| s.name.as_str()).collect();
		assert_eq!(step_names, vec!["cluster.connect", "sequence", "cluster.finish", "cluster.delete"]);

		let finish_cfg: crate::cluster::steps::finish::FinishCfg = outer.steps[2].config.decode().unwrap();
		assert!(finish_cfg.wait_for_peers);

		let body: crate::runner::sequence::SequenceCfg = outer.steps[1].config.decode().unwrap();
		let body_names: Vec<&str> = body.steps.iter().map(|s| s.name.as_str()).collect();
		assert_eq!(body_names, vec!["connect", "metricsCreate", "repeat", "metricsFix"]);

		let repeat_cfg: crate::runner::repeat::RepeatCfg = body.steps[2].config.decode().unwrap();
		assert_eq!(repeat_cfg.executor, "parallel");
		assert_eq!(repeat_cfg.count, 10);
		let per_log: crate::runner::sequence::SequenceCfg = repeat_cfg.action.config.decode().unwrap();
		let per_log_names: Vec<&str> = per_log.steps.iter().map(|s| s.name.as_str()).collect();
		assert_eq!(per_log_names, vec!["solaris.createLog", "solaris.append", "solaris.seqQueryMsgs", "solaris.deleteLog"]);
	}

	#[test]
	fn sleep_op_produces_a_pause_step() {
		let test = sleep_test(&[50]).unwrap();
		assert_eq!(test.name, "Sleep for 50ms");
		assert_eq!(test.scenario.name, "pause");
	}

	#[test]
	fn unknown_op_is_rejected() {
		assert!(synthesize_config("nope", &[]).is_err());
	}

	#[test]
	fn wrong_param_count_is_rejected() {
		assert!(append_test(&[1, 2, 3]).is_err());
	}
}
