use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cluster::log_backed::LogBackedCluster;
use crate::context::{Context, Value, CLUSTER_CLIENT_KEY, CLUSTER_NODE_KEY};
use crate::errors::PerfTestError;
use crate::log_service::grpc_client::GrpcLogServiceClient;
use crate::runner::{RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};

pub const NAME: &str = "cluster.connect";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectCfg {
	#[serde(default)]
	pub address: String,
	#[serde(default)]
	pub env_var_address: String,
	#[serde(default, rename = "envRunID")]
	pub env_run_id: String,
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

		let mut address = cfg.address;
		if !cfg.env_var_address.is_empty() {
			if let Ok(resolved) = std::env::var(&cfg.env_var_address) {
				address = resolved;
			}
		}

		let run_id = match std::env::var(&cfg.env_run_id) {
			Ok(v) => v,
			Err(_) => return ScenarioResult::err(ctx, PerfTestError::NotExist(format!("RunID not found by env var: {}", cfg.env_run_id))),
		};

		let client = match GrpcLogServiceClient::dial(&address).await {
			Ok(c) => Arc::new(c),
			Err(e) => return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed to dial to address {address}: {e}"))),
		};

		// Original code staggers connecting nodes with a random jitter so they
		// don't all hit the service in the same instant.
		let jitter = rand::thread_rng().gen_range(0..3000);
		tokio::time::sleep(Duration::from_millis(jitter)).await;

		let cluster = match LogBackedCluster::connect(client, &run_id).await {
			Ok(c) => c,
			Err(e) => return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed to create cluster: {e}"))),
		};
		let node = match cluster.add_node().await {
			Ok(n) => n,
			Err(e) => return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed to add node to cluster: {e}"))),
		};

		let ctx = ctx.with_value_if_absent(CLUSTER_CLIENT_KEY, Value::Cluster(cluster));
		let ctx = ctx.with_value_if_absent(CLUSTER_NODE_KEY, Value::Node(node));
		ScenarioResult::ok(ctx)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn env_run_id_missing_is_reported_by_name() {
		let cfg = ConnectCfg { env_run_id: "PERFTESTS_RUN_ID".to_string(), ..Default::default() };
		assert!(std::env::var(&cfg.env_run_id).is_err());
	}
}
