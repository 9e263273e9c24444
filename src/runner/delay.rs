use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};
use crate::context::Context;
use crate::errors::PerfTestError;

pub const NAME: &str = "delay";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DelayCfg {
	pub function: String,
}

static NORMAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"normal\s*\(\s*(\d+)\s*,\s*(\d+)\s*\)").unwrap());
static UNIFORM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"uniform\s*\(\s*(\d+)\s*,\s*(\d+)\s*\)").unwrap());
static CONSTANT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"constant\s*\(\s*(\d+)\s*\)").unwrap());

fn parse_delay_millis(function: &str) -> Result<i64, PerfTestError> {
	if let Some(caps) = NORMAL_RE.captures(function) {
		let mean: f64 = caps[1].parse().map_err(|_| PerfTestError::Invalid(format!("bad normal() mean in {function}")))?;
		let std_dev: f64 = caps[2].parse().map_err(|_| PerfTestError::Invalid(format!("bad normal() stddev in {function}")))?;
		let normal = Normal::new(mean, std_dev).map_err(|e| PerfTestError::Invalid(e.to_string()))?;
		return Ok(normal.sample(&mut rand::thread_rng()) as i64);
	}
	if let Some(caps) = UNIFORM_RE.captures(function) {
		let min: i64 = caps[1].parse().map_err(|_| PerfTestError::Invalid(format!("bad uniform() min in {function}")))?;
		let max: i64 = caps[2].parse().map_err(|_| PerfTestError::Invalid(format!("bad uniform() max in {function}")))?;
		if min > max {
			return Err(PerfTestError::Invalid("max should be greater than min".to_string()));
		}
		if min == max {
			return Ok(min);
		}
		return Ok(rand::thread_rng().gen_range(min..max));
	}
	if let Some(caps) = CONSTANT_RE.captures(function) {
		let value: i64 = caps[1].parse().map_err(|_| PerfTestError::Invalid(format!("bad constant() value in {function}")))?;
		return Ok(value);
	}
	Err(PerfTestError::Invalid(format!("unknown delay function: {function}")))
}

pub struct DelayExecutor {
	index: RunnerIndex,
}

impl DelayExecutor {
	pub fn new() -> DelayExecutor {
		DelayExecutor { index: RunnerIndex::new() }
	}
}

impl Default for DelayExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for DelayExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(DelayRunner { name })
	}
}

pub struct DelayRunner {
	name: String,
}

#[async_trait]
impl ScenarioRunner for DelayRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let cfg: DelayCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};
		let millis = match parse_delay_millis(&cfg.function) {
			Ok(m) => m,
			Err(e) => return ScenarioResult::err(ctx, e),
		};
		if millis > 0 {
			tokio::time::sleep(Duration::from_millis(millis as u64)).await;
		}
		ScenarioResult::ok(ctx)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_constant() {
		assert_eq!(parse_delay_millis("constant(42)").unwrap(), 42);
	}

	#[test]
	fn parses_uniform_within_bounds() {
		for _ in 0..50 {
			let v = parse_delay_millis("uniform(10, 20)").unwrap();
			assert!((10..20).contains(&v));
		}
	}

	#[test]
	fn uniform_rejects_inverted_bounds() {
		assert!(parse_delay_millis("uniform(20, 10)").is_err());
	}

	#[test]
	fn parses_normal_without_erroring() {
		assert!(parse_delay_millis("normal(100, 10)").is_ok());
	}

	#[test]
	fn unknown_function_is_invalid() {
		assert!(parse_delay_millis("triangular(1,2,3)").is_err());
	}
}
