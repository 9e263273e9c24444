use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};
use crate::context::{Context, Value, PAUSE_RUNNERS_COUNTER_KEY};
use crate::errors::PerfTestError;

pub const NAME: &str = "pause";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PauseCfg {
	#[serde(default)]
	pub value: String,
}

pub struct PauseExecutor {
	index: RunnerIndex,
}

impl PauseExecutor {
	pub fn new() -> PauseExecutor {
		PauseExecutor { index: RunnerIndex::new() }
	}
}

impl Default for PauseExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for PauseExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(PauseRunner { name })
	}
}

pub struct PauseRunner {
	name: String,
}

#[async_trait]
impl ScenarioRunner for PauseRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let cfg: PauseCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};
		if !cfg.value.is_empty() {
			let dur = match humantime::parse_duration(&cfg.value) {
				Ok(d) => d,
				Err(e) => return ScenarioResult::err(ctx, PerfTestError::Invalid(format!("failed to parse pause value: {e}"))),
			};
			tokio::time::sleep(dur).await;
		}

		let counter = match ctx.get_int(PAUSE_RUNNERS_COUNTER_KEY) {
			Some(c) => c + 1,
			None => 1,
		};
		tracing::debug!(counter, "pause runners counter");
		ScenarioResult::ok(ctx.with_value(PAUSE_RUNNERS_COUNTER_KEY, Value::Int(counter)))
	}
}
