use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{Context, CLUSTER_CLIENT_KEY};
use crate::errors::PerfTestError;
use crate::runner::{RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};

pub const NAME: &str = "cluster.delete";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DeleteCfg {}

pub struct DeleteExecutor {
	index: RunnerIndex,
}

impl DeleteExecutor {
	pub fn new() -> DeleteExecutor {
		DeleteExecutor { index: RunnerIndex::new() }
	}
}

impl Default for DeleteExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for DeleteExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(DeleteRunner { name })
	}
}

pub struct DeleteRunner {
	name: String,
}

#[async_trait]
impl ScenarioRunner for DeleteRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let _: DeleteCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};

		let Some(cluster) = ctx.get_cluster(CLUSTER_CLIENT_KEY) else {
			return ScenarioResult::err(ctx, PerfTestError::NotExist("cluster not found".to_string()));
		};
		if let Err(e) = cluster.delete().await {
			return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed to delete cluster: {e}")));
		}
		ScenarioResult::ok(ctx.without_value(CLUSTER_CLIENT_KEY))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::Value;
	use crate::cluster::log_backed::LogBackedCluster;
	use crate::log_service::fake::InMemoryLogServiceClient;
	use crate::log_service::LogServiceClient;
	use tokio_util::sync::CancellationToken;

	#[tokio::test]
	async fn deletes_cluster_and_clears_binding() {
		let client: Arc<dyn LogServiceClient> = InMemoryLogServiceClient::new();
		let cluster = LogBackedCluster::connect(client, "run-delete").await.unwrap();
		cluster.add_node().await.unwrap();

		let ctx = Context::new(CancellationToken::new()).with_value(CLUSTER_CLIENT_KEY, Value::Cluster(cluster));
		let exec = DeleteExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&DeleteCfg::default());
		let res = runner.run(ctx, &cfg).await;
		assert!(res.is_ok());
		assert!(res.ctx.get_cluster(CLUSTER_CLIENT_KEY).is_none());
	}

	#[tokio::test]
	async fn missing_cluster_fails() {
		let exec = DeleteExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&DeleteCfg::default());
		let res = runner.run(Context::new(CancellationToken::new()), &cfg).await;
		assert!(!res.is_ok());
	}
}
