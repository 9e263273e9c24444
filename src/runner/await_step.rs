use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};
use crate::context::Context;
use crate::errors::PerfTestError;

pub const NAME: &str = "await";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwaitCfg {
	pub trigger_name: String,
}

/// Blocks until the cancellation token bound under `triggerName` fires.
/// Nothing in this crate binds a trigger under an arbitrary name yet — the
/// binding point is left for scenario authors wiring custom coordination
/// between tree branches, the same incomplete state the original leaves it in.
pub struct AwaitExecutor {
	index: RunnerIndex,
}

impl AwaitExecutor {
	pub fn new() -> AwaitExecutor {
		AwaitExecutor { index: RunnerIndex::new() }
	}
}

impl Default for AwaitExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for AwaitExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(AwaitRunner { name })
	}
}

pub struct AwaitRunner {
	name: String,
}

#[async_trait]
impl ScenarioRunner for AwaitRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let cfg: AwaitCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};

		let Some(trigger) = ctx.get_trigger(&cfg.trigger_name) else {
			return ScenarioResult::err(ctx, PerfTestError::NotExist(format!("trigger \"{}\" not bound", cfg.trigger_name)));
		};
		tracing::trace!(trigger = %cfg.trigger_name, "start await");
		trigger.cancelled().await;
		tracing::trace!(trigger = %cfg.trigger_name, "complete await");
		ScenarioResult::ok(ctx)
	}
}
