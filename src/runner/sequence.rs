use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{get_duration_metric, get_rate_metric, RunnerIndex, Scenario, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};
use crate::context::Context;
use crate::errors::PerfTestError;
use crate::registry::Registry;

pub const NAME: &str = "sequence";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceCfg {
	#[serde(default)]
	pub skip_errors: bool,
	pub steps: Vec<Scenario>,
	#[serde(default)]
	pub timeout_metric: String,
	#[serde(default)]
	pub rps_metric: String,
}

pub struct SequenceExecutor {
	registry: Arc<Registry>,
	index: RunnerIndex,
}

impl SequenceExecutor {
	pub fn new(registry: Arc<Registry>) -> SequenceExecutor {
		SequenceExecutor { registry, index: RunnerIndex::new() }
	}
}

impl ScenarioExecutor for SequenceExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(SequenceRunner { registry: self.registry.clone(), name })
	}
}

pub struct SequenceRunner {
	registry: Arc<Registry>,
	name: String,
}

#[async_trait]
impl ScenarioRunner for SequenceRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}

		let cfg: SequenceCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};

		let mut cur = ctx.clone();
		for (index, step) in cfg.steps.iter().enumerate() {
			let Some(executor) = self.registry.get(&step.name) else {
				return ScenarioResult::err(
					ctx,
					PerfTestError::NotExist(format!("no runner for step \"{}\" index[{index}]", step.name)),
				);
			};
			let timeout_metric = get_duration_metric(&cur, &cfg.timeout_metric);
			let rps_metric = get_rate_metric(&cur, &cfg.rps_metric);

			let start = Instant::now();
			let step_res = executor.new_runner(&self.name).run(cur.clone(), &step.config).await;
			let elapsed = start.elapsed();
			if let Some(m) = timeout_metric {
				m.add(elapsed.as_nanos() as i64);
			}
			if let Some(m) = rps_metric {
				m.add(1.0, elapsed);
			}

			match step_res.error {
				None => cur = step_res.ctx,
				Some(err) if cfg.skip_errors => {
					cur = step_res.ctx.with_skipped_error(format!("{}/step#{index}", self.name), err.to_string());
				}
				Some(err) => {
					return ScenarioResult::err(
						ctx,
						PerfTestError::Internal(format!("failed run of runner \"{}\" index[{index}]: {err}", step.name)),
					);
				}
			}
		}
		ScenarioResult::ok(cur)
	}
}
