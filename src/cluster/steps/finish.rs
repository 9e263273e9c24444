use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{Context, CLUSTER_CLIENT_KEY, CLUSTER_NODE_KEY};
use crate::errors::PerfTestError;
use crate::metrics::MetricResult;
use crate::runner::{RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};

pub const NAME: &str = "cluster.finish";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishCfg {
	#[serde(default)]
	pub metrics: Vec<String>,
	#[serde(default, rename = "await")]
	pub wait_for_peers: bool,
}

/// The node-result record posted to a node's own log: `{status, metrics}`
/// where each metric is `{type, result}` via `MetricResult`'s own tagging.
#[derive(Debug, Serialize, Deserialize)]
struct NodeResult {
	status: String,
	metrics: BTreeMap<String, MetricResult>,
}

pub struct FinishExecutor {
	index: RunnerIndex,
}

impl FinishExecutor {
	pub fn new() -> FinishExecutor {
		FinishExecutor { index: RunnerIndex::new() }
	}
}

impl Default for FinishExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for FinishExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(FinishRunner { name })
	}
}

pub struct FinishRunner {
	name: String,
}

#[async_trait]
impl ScenarioRunner for FinishRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let cfg: FinishCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};

		let Some(node) = ctx.get_node(CLUSTER_NODE_KEY) else {
			return ScenarioResult::err(ctx, PerfTestError::NotExist("cluster node not found".to_string()));
		};

		let mut metrics = BTreeMap::new();
		for name in &cfg.metrics {
			let Some(value) = ctx.get_metric(name) else {
				return ScenarioResult::err(ctx, PerfTestError::NotExist(format!("unknown metric: {name}")));
			};
			metrics.insert(name.clone(), value.to_result());
		}
		let own_result = NodeResult { status: "OK".to_string(), metrics };
		let payload = match serde_json::to_vec(&own_result) {
			Ok(p) => p,
			Err(e) => return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed to serialize node result: {e}"))),
		};
		// Original ignores the error from reporting the node's own result;
		// a failure here shouldn't stop the rest of the scenario from running.
		let _ = node.finish(payload).await;

		let Some(cluster) = ctx.get_cluster(CLUSTER_CLIENT_KEY) else {
			return ScenarioResult::err(ctx, PerfTestError::NotExist("cluster not found".to_string()));
		};

		if cfg.wait_for_peers {
			let nodes = match cluster.nodes().await {
				Ok(nodes) => nodes,
				Err(e) => return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed to read cluster nodes: {e}"))),
			};
			let mut merged: BTreeMap<String, MetricResult> = BTreeMap::new();
			for node in nodes {
				let raw = match node.result().await {
					Ok(res) => res,
					Err(e) => {
						tracing::error!(error = %e, "peer node failed");
						continue;
					},
				};
				let peer: NodeResult = match serde_json::from_slice(&raw) {
					Ok(r) => r,
					Err(e) => {
						tracing::error!(error = %e, "peer node result is not valid JSON");
						continue;
					},
				};
				tracing::info!(status = %peer.status, metrics = ?peer.metrics, "peer node finished");
				for (name, result) in peer.metrics {
					match merged.remove(&name) {
						Some(running) => match running.merge(&result) {
							Ok(combined) => {
								merged.insert(name, combined);
							},
							Err(e) => {
								tracing::error!(metric = %name, error = %e, "failed to merge peer metric");
								merged.insert(name, running);
							},
						},
						None => {
							merged.insert(name, result);
						},
					}
				}
			}
			tracing::info!(metrics = ?merged, "merged totals across cluster");
		}

		ScenarioResult::ok(ctx)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cluster::log_backed::LogBackedCluster;
	use crate::context::Value;
	use crate::log_service::fake::InMemoryLogServiceClient;
	use crate::log_service::LogServiceClient;
	use crate::metrics::{MetricKind, MetricValue};
	use tokio_util::sync::CancellationToken;

	#[tokio::test]
	async fn reports_own_result_and_waits_for_peers() {
		let client: Arc<dyn LogServiceClient> = InMemoryLogServiceClient::new();
		let cluster = LogBackedCluster::connect(client, "run-finish").await.unwrap();
		let node = cluster.add_node().await.unwrap();

		let metric = MetricValue::new(MetricKind::Int);
		metric.as_int().unwrap().add(7);

		let ctx = Context::new(CancellationToken::new())
			.with_value(CLUSTER_CLIENT_KEY, Value::Cluster(cluster.clone()))
			.with_value(CLUSTER_NODE_KEY, Value::Node(node))
			.with_value("reqs", Value::Metric(metric));

		let exec = FinishExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&FinishCfg { metrics: vec!["reqs".to_string()], wait_for_peers: true });
		let res = runner.run(ctx, &cfg).await;
		assert!(res.is_ok());
	}

	#[tokio::test]
	async fn merges_peer_metrics_by_kind_when_awaiting() {
		let client: Arc<dyn LogServiceClient> = InMemoryLogServiceClient::new();
		let cluster = LogBackedCluster::connect(client, "run-finish-merge").await.unwrap();

		let node_a = cluster.add_node().await.unwrap();
		let metric_a = MetricValue::new(MetricKind::Int);
		metric_a.as_int().unwrap().add(2);
		let ctx_a = Context::new(CancellationToken::new())
			.with_value(CLUSTER_CLIENT_KEY, Value::Cluster(cluster.clone()))
			.with_value(CLUSTER_NODE_KEY, Value::Node(node_a))
			.with_value("reqs", Value::Metric(metric_a));
		let exec = FinishExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&FinishCfg { metrics: vec!["reqs".to_string()], wait_for_peers: false });
		assert!(runner.run(ctx_a, &cfg).await.is_ok());

		let node_b = cluster.add_node().await.unwrap();
		let metric_b = MetricValue::new(MetricKind::Int);
		metric_b.as_int().unwrap().add(3);
		let ctx_b = Context::new(CancellationToken::new())
			.with_value(CLUSTER_CLIENT_KEY, Value::Cluster(cluster.clone()))
			.with_value(CLUSTER_NODE_KEY, Value::Node(node_b))
			.with_value("reqs", Value::Metric(metric_b));
		let cfg_await = ScenarioConfig::from(&FinishCfg { metrics: vec!["reqs".to_string()], wait_for_peers: true });
		let res = runner.run(ctx_b, &cfg_await).await;
		assert!(res.is_ok());
	}

	#[tokio::test]
	async fn missing_node_fails() {
		let exec = FinishExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&FinishCfg::default());
		let res = runner.run(Context::new(CancellationToken::new()), &cfg).await;
		assert!(!res.is_ok());
	}

	#[tokio::test]
	async fn unknown_metric_fails() {
		let client: Arc<dyn LogServiceClient> = InMemoryLogServiceClient::new();
		let cluster = LogBackedCluster::connect(client, "run-finish-unknown").await.unwrap();
		let node = cluster.add_node().await.unwrap();
		let ctx = Context::new(CancellationToken::new())
			.with_value(CLUSTER_CLIENT_KEY, Value::Cluster(cluster))
			.with_value(CLUSTER_NODE_KEY, Value::Node(node));
		let exec = FinishExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&FinishCfg { metrics: vec!["nope".to_string()], wait_for_peers: false });
		let res = runner.run(ctx, &cfg).await;
		assert!(!res.is_ok());
	}
}
