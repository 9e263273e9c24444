use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{Context, Value, SOLARIS_CLIENT_KEY, SOLARIS_LOG_KEY};
use crate::errors::PerfTestError;
use crate::runner::{RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};

pub const NAME: &str = "solaris.createLog";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateLogCfg {
	#[serde(default)]
	pub tags: HashMap<String, String>,
}

pub struct CreateLogExecutor {
	index: RunnerIndex,
}

impl CreateLogExecutor {
	pub fn new() -> CreateLogExecutor {
		CreateLogExecutor { index: RunnerIndex::new() }
	}
}

impl Default for CreateLogExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for CreateLogExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(CreateLogRunner { name })
	}
}

pub struct CreateLogRunner {
	name: String,
}

#[async_trait]
impl ScenarioRunner for CreateLogRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let cfg: CreateLogCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};

		let Some(client) = ctx.get_log_client(SOLARIS_CLIENT_KEY) else {
			return ScenarioResult::err(ctx, PerfTestError::NotExist("solaris service not found".to_string()));
		};

		let log = match client.create_log(cfg.tags).await {
			Ok(log) => log,
			Err(e) => return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed to create a log: {e}"))),
		};
		ScenarioResult::ok(ctx.with_value_if_absent(SOLARIS_LOG_KEY, Value::Str(log.id)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::log_service::fake::InMemoryLogServiceClient;
	use tokio_util::sync::CancellationToken;

	#[tokio::test]
	async fn creates_a_log_and_binds_its_id() {
		let client = InMemoryLogServiceClient::new();
		let ctx = Context::new(CancellationToken::new()).with_value(SOLARIS_CLIENT_KEY, Value::LogClient(client));
		let exec = CreateLogExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&CreateLogCfg { tags: HashMap::from([("env".to_string(), "test".to_string())]) });
		let res = runner.run(ctx, &cfg).await;
		assert!(res.is_ok());
		assert!(res.ctx.get_str(SOLARIS_LOG_KEY).is_some());
	}

	#[tokio::test]
	async fn missing_client_fails() {
		let exec = CreateLogExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&CreateLogCfg::default());
		let res = runner.run(Context::new(CancellationToken::new()), &cfg).await;
		assert!(!res.is_ok());
	}
}
