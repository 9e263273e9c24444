use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{Context, SOLARIS_CLIENT_KEY, SOLARIS_LOG_KEY};
use crate::errors::PerfTestError;
use crate::runner::{RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};

pub const NAME: &str = "solaris.deleteLog";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DeleteLogCfg {}

pub struct DeleteLogExecutor {
	index: RunnerIndex,
}

impl DeleteLogExecutor {
	pub fn new() -> DeleteLogExecutor {
		DeleteLogExecutor { index: RunnerIndex::new() }
	}
}

impl Default for DeleteLogExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for DeleteLogExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(DeleteLogRunner { name })
	}
}

pub struct DeleteLogRunner {
	name: String,
}

#[async_trait]
impl ScenarioRunner for DeleteLogRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let _: DeleteLogCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};

		let Some(client) = ctx.get_log_client(SOLARIS_CLIENT_KEY) else {
			return ScenarioResult::err(ctx, PerfTestError::NotExist("solaris service not found".to_string()));
		};
		let Some(log_id) = ctx.get_str(SOLARIS_LOG_KEY) else {
			return ScenarioResult::err(ctx, PerfTestError::NotExist("solaris log not found".to_string()));
		};

		if let Err(e) = client.delete_logs(&format!("logID='{log_id}'")).await {
			return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed to delete log {log_id}: {e}")));
		}
		ScenarioResult::ok(ctx.without_value(SOLARIS_LOG_KEY))
	}
}
