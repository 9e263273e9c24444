use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::cluster::{Cluster, ClusterRecord, Node};
use crate::errors::{PerfTestError, Result};
use crate::log_service::{LogServiceClient, QueryLogsRequest, QueryRecordsRequest, Record};

const TAG_KEY: &str = "solarisdb.perftests.cluster";

fn tag_condition(value: &str) -> String {
	format!("tag({TAG_KEY:?})={value:?}")
}

async fn get_or_create_log(client: &Arc<dyn LogServiceClient>, tag_value: &str) -> Result<String> {
	let res = client.query_logs(QueryLogsRequest { condition: tag_condition(tag_value), page_id: String::new() }).await?;
	if let Some(log) = res.logs.into_iter().next() {
		return Ok(log.id);
	}
	let log = client.create_log(std::collections::HashMap::from([(TAG_KEY.to_string(), tag_value.to_string())])).await?;
	Ok(log.id)
}

/// A `Cluster` with no coordination service of its own: the rendezvous log
/// (tagged with the run ID) holds one record per node pointing at that
/// node's own log, where it later appends its result.
pub struct LogBackedCluster {
	client: Arc<dyn LogServiceClient>,
	cluster_log_id: String,
}

impl LogBackedCluster {
	pub async fn connect(client: Arc<dyn LogServiceClient>, run_id: &str) -> Result<Arc<LogBackedCluster>> {
		let cluster_log_id = get_or_create_log(&client, run_id).await?;
		Ok(Arc::new(LogBackedCluster { client, cluster_log_id }))
	}
}

#[async_trait]
impl Cluster for LogBackedCluster {
	async fn add_node(&self) -> Result<Arc<dyn Node>> {
		let node_id = Uuid::new_v4().to_string();
		let node_log_id = get_or_create_log(&self.client, &node_id).await?;
		let record = ClusterRecord { node_id: node_id.clone(), node_log_id: node_log_id.clone() };
		let payload = serde_json::to_vec(&record).map_err(|e| PerfTestError::Internal(format!("failed to encode node record: {e}")))?;
		self.client
			.append_records(&self.cluster_log_id, vec![Record { id: String::new(), payload }])
			.await
			.map_err(|e| PerfTestError::Internal(format!("failed to append node to cluster log {}: {e}", self.cluster_log_id)))?;
		Ok(Arc::new(LogBackedNode { client: self.client.clone(), node_id, node_log_id }))
	}

	async fn nodes(&self) -> Result<Vec<Arc<dyn Node>>> {
		let mut nodes: Vec<Arc<dyn Node>> = Vec::new();
		let mut from_id = String::new();
		loop {
			let req = QueryRecordsRequest {
				log_ids: vec![self.cluster_log_id.clone()],
				limit: 100,
				start_record_id: from_id.clone(),
				descending: false,
			};
			let res = self.client.query_records(req).await.map_err(|e| PerfTestError::Internal(format!("failed to query nodes: {e}")))?;
			for rec in &res.records {
				if let Ok(record) = serde_json::from_slice::<ClusterRecord>(&rec.payload) {
					nodes.push(Arc::new(LogBackedNode {
						client: self.client.clone(),
						node_id: record.node_id,
						node_log_id: record.node_log_id,
					}));
				}
			}
			from_id = res.next_page_id;
			if from_id.is_empty() {
				break;
			}
		}
		Ok(nodes)
	}

	async fn delete(&self) -> Result<()> {
		for node in self.nodes().await? {
			let _ = node.delete().await;
		}
		self.client.delete_logs(&format!("logID='{}'", self.cluster_log_id)).await
	}
}

pub struct LogBackedNode {
	client: Arc<dyn LogServiceClient>,
	#[allow(dead_code)]
	node_id: String,
	node_log_id: String,
}

#[async_trait]
impl Node for LogBackedNode {
	async fn finish(&self, result: Vec<u8>) -> Result<()> {
		self.client.append_records(&self.node_log_id, vec![Record { id: String::new(), payload: result }]).await
	}

	async fn delete(&self) -> Result<()> {
		self.client.delete_logs(&format!("logID='{}'", self.node_log_id)).await
	}

	/// Polls indefinitely, five seconds at a time, until the node's log has
	/// a result record. There is no overall deadline — a peer that never
	/// finishes leaves this waiting forever, mirroring the original poller.
	async fn result(&self) -> Result<Vec<u8>> {
		loop {
			let req = QueryRecordsRequest { log_ids: vec![self.node_log_id.clone()], limit: 1, start_record_id: String::new(), descending: false };
			let res = self
				.client
				.query_records(req)
				.await
				.map_err(|e| PerfTestError::Internal(format!("failed to query node result: {e}")))?;
			if let Some(rec) = res.records.into_iter().next() {
				return Ok(rec.payload);
			}
			tokio::time::sleep(Duration::from_secs(5)).await;
		}
	}
}
