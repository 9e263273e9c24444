use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::parallel::ParallelCfg;
use super::sequence::SequenceCfg;
use super::{RunnerIndex, Scenario, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};
use crate::context::Context;
use crate::errors::PerfTestError;
use crate::registry::Registry;

pub const NAME: &str = "repeat";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatCfg {
	#[serde(default)]
	pub period: String,
	#[serde(default)]
	pub count: usize,
	pub action: Scenario,
	#[serde(default)]
	pub executor: String,
	#[serde(default)]
	pub skip_errors: bool,
}

/// Materializes `count` copies of `action` into either a `sequence` (each
/// copy followed by a `pause(period)` when one is set) or a `parallel`
/// (fired together, then paused once after all finish), and delegates to
/// whichever executor is actually named.
pub struct RepeatExecutor {
	registry: Arc<Registry>,
	index: RunnerIndex,
}

impl RepeatExecutor {
	pub fn new(registry: Arc<Registry>) -> RepeatExecutor {
		RepeatExecutor { registry, index: RunnerIndex::new() }
	}
}

impl ScenarioExecutor for RepeatExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(RepeatRunner { registry: self.registry.clone(), name })
	}
}

pub struct RepeatRunner {
	registry: Arc<Registry>,
	name: String,
}

#[async_trait]
impl ScenarioRunner for RepeatRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let cfg: RepeatCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};

		let period = if cfg.period.is_empty() {
			Duration::ZERO
		} else {
			match humantime::parse_duration(&cfg.period) {
				Ok(d) => d,
				Err(e) => return ScenarioResult::err(ctx, PerfTestError::Invalid(format!("failed to parse period: {e}"))),
			}
		};

		let executor_name = if cfg.executor.is_empty() { super::sequence::NAME } else { cfg.executor.as_str() };
		let Some(executor) = self.registry.get(executor_name) else {
			return ScenarioResult::err(ctx, PerfTestError::NotExist(format!("failed to get executor {executor_name}")));
		};

		let child = executor.new_runner(&self.name);
		match executor_name {
			name if name == super::sequence::NAME => {
				let mut steps = Vec::with_capacity(cfg.count * 2);
				for _ in 0..cfg.count {
					steps.push(cfg.action.clone());
					if !cfg.period.is_empty() {
						steps.push(Scenario {
							name: super::pause::NAME.to_string(),
							config: ScenarioConfig::from(&super::pause::PauseCfg { value: cfg.period.clone() }),
						});
					}
				}
				let seq_cfg = ScenarioConfig::from(&SequenceCfg {
					skip_errors: cfg.skip_errors,
					steps,
					timeout_metric: String::new(),
					rps_metric: String::new(),
				});
				child.run(ctx, &seq_cfg).await
			}
			name if name == super::parallel::NAME => {
				let steps = vec![cfg.action.clone(); cfg.count];
				let par_cfg = ScenarioConfig::from(&ParallelCfg { skip_errors: cfg.skip_errors, steps });
				let result = child.run(ctx, &par_cfg).await;
				if result.is_ok() && !period.is_zero() {
					tokio::time::sleep(period).await;
				}
				result
			}
			other => ScenarioResult::err(ctx, PerfTestError::Unsupported(format!("unsupported executor name {other}"))),
		}
	}
}
