use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{RunnerIndex, Scenario, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};
use crate::context::Context;
use crate::errors::PerfTestError;
use crate::registry::Registry;

pub const NAME: &str = "weighted";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WeightedCfg {
	pub steps: Vec<Scenario>,
	#[serde(default)]
	pub weights: Vec<u64>,
}

/// On each run, picks exactly one of `steps` at random, favouring steps by
/// `weights` (steps beyond the weight list default to weight 1).
pub struct WeightedExecutor {
	registry: Arc<Registry>,
	index: RunnerIndex,
}

impl WeightedExecutor {
	pub fn new(registry: Arc<Registry>) -> WeightedExecutor {
		WeightedExecutor { registry, index: RunnerIndex::new() }
	}
}

impl ScenarioExecutor for WeightedExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(WeightedRunner { registry: self.registry.clone(), name })
	}
}

pub struct WeightedRunner {
	registry: Arc<Registry>,
	name: String,
}

fn choose_step<'a>(steps: &'a [Scenario], weights: &[u64]) -> Result<&'a Scenario, PerfTestError> {
	if steps.is_empty() {
		return Err(PerfTestError::NotExist("must have at least one step defined".to_string()));
	}

	let mut total = 0u64;
	let mut cumulative = Vec::with_capacity(steps.len());
	for idx in 0..steps.len() {
		total += weights.get(idx).copied().unwrap_or(1);
		cumulative.push(total);
	}

	let pick = rand::thread_rng().gen_range(0..=total);
	cumulative
		.iter()
		.position(|&c| pick <= c)
		.map(|idx| &steps[idx])
		.ok_or(PerfTestError::Internal("weighted selection produced no step".to_string()))
}

#[async_trait]
impl ScenarioRunner for WeightedRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let cfg: WeightedCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};

		let step = match choose_step(&cfg.steps, &cfg.weights) {
			Ok(step) => step,
			Err(e) => return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed select step: {e}"))),
		};

		let Some(executor) = self.registry.get(&step.name) else {
			return ScenarioResult::err(ctx, PerfTestError::NotExist(format!("failed to get step runner {}", step.name)));
		};
		executor.new_runner(&self.name).run(ctx, &step.config).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_steps_rejected() {
		assert!(choose_step(&[], &[]).is_err());
	}

	#[test]
	fn heavier_weight_wins_most_draws() {
		let steps = vec![
			Scenario { name: "a".into(), config: ScenarioConfig::default() },
			Scenario { name: "b".into(), config: ScenarioConfig::default() },
		];
		let weights = vec![1, 99];
		let mut b_count = 0;
		for _ in 0..200 {
			if choose_step(&steps, &weights).unwrap().name == "b" {
				b_count += 1;
			}
		}
		assert!(b_count > 150, "expected heavily weighted step to dominate, got {b_count}/200");
	}

	#[test]
	fn missing_weights_default_to_one() {
		let steps = vec![
			Scenario { name: "a".into(), config: ScenarioConfig::default() },
			Scenario { name: "b".into(), config: ScenarioConfig::default() },
		];
		for _ in 0..20 {
			choose_step(&steps, &[]).unwrap();
		}
	}
}
