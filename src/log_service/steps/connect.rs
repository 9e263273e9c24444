use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{Context, Value, SOLARIS_CLIENT_KEY};
use crate::errors::PerfTestError;
use crate::log_service::grpc_client::GrpcLogServiceClient;
use crate::runner::{RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};

pub const NAME: &str = "connect";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConnectCfg {
	pub address: String,
}

pub struct ConnectExecutor {
	index: RunnerIndex,
}

impl ConnectExecutor {
	pub fn new() -> ConnectExecutor {
		ConnectExecutor { index: RunnerIndex::new() }
	}
}

impl Default for ConnectExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for ConnectExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(ConnectRunner { name })
	}
}

pub struct ConnectRunner {
	name: String,
}

#[async_trait]
impl ScenarioRunner for ConnectRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let cfg: ConnectCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};

		let client = match GrpcLogServiceClient::dial(&cfg.address).await {
			Ok(c) => Arc::new(c),
			Err(e) => return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed to dial to address {}: {e}", cfg.address))),
		};
		ScenarioResult::ok(ctx.with_value_if_absent(SOLARIS_CLIENT_KEY, Value::LogClient(client)))
	}
}
