use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};
use crate::context::Context;
use crate::errors::PerfTestError;

pub const NAME: &str = "error";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ErrorCfg {
	pub error: String,
}

/// Always fails with a fixed message — used to exercise `skipErrors` paths
/// and `error`-branch testing without needing a real failing step.
pub struct ErrorExecutor {
	index: RunnerIndex,
}

impl ErrorExecutor {
	pub fn new() -> ErrorExecutor {
		ErrorExecutor { index: RunnerIndex::new() }
	}
}

impl Default for ErrorExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for ErrorExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(ErrorRunner { name })
	}
}

pub struct ErrorRunner {
	name: String,
}

#[async_trait]
impl ScenarioRunner for ErrorRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let cfg: ErrorCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};
		ScenarioResult::err(ctx, PerfTestError::Invalid(cfg.error))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio_util::sync::CancellationToken;

	#[tokio::test]
	async fn always_fails_with_configured_message() {
		let exec = ErrorExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&ErrorCfg { error: "boom".into() });
		let res = runner.run(Context::new(CancellationToken::new()), &cfg).await;
		assert!(!res.is_ok());
		assert!(res.error.unwrap().to_string().contains("boom"));
	}
}
