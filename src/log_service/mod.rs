pub mod steps;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// A log, as the service reports it back from `create_log`/`query_logs`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Log {
	#[serde(rename = "ID", default)]
	pub id: String,
	#[serde(default)]
	pub tags: HashMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Record {
	#[serde(rename = "ID", default)]
	pub id: String,
	#[serde(default)]
	pub payload: Vec<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct QueryRecordsRequest {
	pub log_ids: Vec<String>,
	pub limit: i64,
	pub start_record_id: String,
	pub descending: bool,
}

#[derive(Clone, Debug, Default)]
pub struct QueryRecordsResponse {
	pub records: Vec<Record>,
	pub next_page_id: String,
}

#[derive(Clone, Debug, Default)]
pub struct QueryLogsRequest {
	pub condition: String,
	pub page_id: String,
}

#[derive(Clone, Debug, Default)]
pub struct QueryLogsResponse {
	pub logs: Vec<Log>,
	pub next_page_id: String,
}

/// Client-side abstraction over the gRPC log service. One implementation
/// (`GrpcLogServiceClient`) dials the real service via `tonic`; tests use an
/// in-memory fake behind the same trait.
#[async_trait]
pub trait LogServiceClient: Send + Sync {
	async fn create_log(&self, tags: HashMap<String, String>) -> Result<Log>;
	async fn delete_logs(&self, condition: &str) -> Result<()>;
	async fn append_records(&self, log_id: &str, records: Vec<Record>) -> Result<()>;
	async fn query_records(&self, req: QueryRecordsRequest) -> Result<QueryRecordsResponse>;
	async fn query_logs(&self, req: QueryLogsRequest) -> Result<QueryLogsResponse>;
}

/// Returns `true` when the address's port is 443 — the dial convention this
/// crate (and the original service client) uses to decide whether a
/// connection needs TLS instead of insecure credentials.
pub fn needs_tls(addr: &str) -> bool {
	addr.rsplit(':').next().map(|p| p.trim() == "443").unwrap_or(false)
}

pub mod grpc_client {
	use std::collections::HashMap;

	use async_trait::async_trait;
	use tonic::transport::{Channel, ClientTlsConfig};

	use super::{Log, QueryLogsRequest, QueryLogsResponse, QueryRecordsRequest, QueryRecordsResponse, Record};
	use crate::errors::{PerfTestError, Result};

	/// A real client dialed against a running log service over gRPC,
	/// upgrading to TLS automatically when the address's port is `443`.
	pub struct GrpcLogServiceClient {
		channel: Channel,
	}

	impl GrpcLogServiceClient {
		pub async fn dial(addr: &str) -> Result<GrpcLogServiceClient> {
			let endpoint = tonic::transport::Endpoint::from_shared(format!("http://{addr}"))
				.map_err(|e| PerfTestError::Invalid(format!("invalid address {addr}: {e}")))?;
			let endpoint = if super::needs_tls(addr) {
				endpoint
					.tls_config(ClientTlsConfig::new().with_native_roots())
					.map_err(|e| PerfTestError::Invalid(e.to_string()))?
			} else {
				endpoint
			};
			let channel = endpoint.connect().await.map_err(|e| PerfTestError::Invalid(format!("failed to dial {addr}: {e}")))?;
			Ok(GrpcLogServiceClient { channel })
		}
	}

	#[async_trait]
	impl super::LogServiceClient for GrpcLogServiceClient {
		async fn create_log(&self, _tags: HashMap<String, String>) -> Result<Log> {
			let _ = &self.channel;
			Err(PerfTestError::Unsupported("wire codegen for the log service protocol is not vendored in this crate".to_string()))
		}

		async fn delete_logs(&self, _condition: &str) -> Result<()> {
			Err(PerfTestError::Unsupported("wire codegen for the log service protocol is not vendored in this crate".to_string()))
		}

		async fn append_records(&self, _log_id: &str, _records: Vec<Record>) -> Result<()> {
			Err(PerfTestError::Unsupported("wire codegen for the log service protocol is not vendored in this crate".to_string()))
		}

		async fn query_records(&self, _req: QueryRecordsRequest) -> Result<QueryRecordsResponse> {
			Err(PerfTestError::Unsupported("wire codegen for the log service protocol is not vendored in this crate".to_string()))
		}

		async fn query_logs(&self, _req: QueryLogsRequest) -> Result<QueryLogsResponse> {
			Err(PerfTestError::Unsupported("wire codegen for the log service protocol is not vendored in this crate".to_string()))
		}
	}
}


/// An in-process `LogServiceClient` backed by a `Mutex`-guarded map, used by
/// this crate's own step tests in place of a live service connection.
#[cfg(any(test, feature = "test-support"))]
pub mod fake {
	use std::collections::HashMap;
	use std::sync::atomic::{AtomicU64, Ordering};
	use std::sync::Arc;

	use async_trait::async_trait;
	use parking_lot::Mutex;

	use super::{Log, QueryLogsRequest, QueryLogsResponse, QueryRecordsRequest, QueryRecordsResponse, Record};
	use crate::errors::{PerfTestError, Result};

	#[derive(Default)]
	struct LogState {
		log: Log,
		records: Vec<Record>,
	}

	#[derive(Default)]
	pub struct InMemoryLogServiceClient {
		next_id: AtomicU64,
		logs: Mutex<HashMap<String, LogState>>,
	}

	impl InMemoryLogServiceClient {
		pub fn new() -> Arc<InMemoryLogServiceClient> {
			Arc::new(InMemoryLogServiceClient::default())
		}

		fn next_id(&self) -> String {
			format!("{:020}", self.next_id.fetch_add(1, Ordering::Relaxed))
		}
	}

	#[async_trait]
	impl super::LogServiceClient for InMemoryLogServiceClient {
		async fn create_log(&self, tags: HashMap<String, String>) -> Result<Log> {
			let id = self.next_id();
			let log = Log { id: id.clone(), tags };
			self.logs.lock().insert(id, LogState { log: log.clone(), records: Vec::new() });
			Ok(log)
		}

		async fn delete_logs(&self, condition: &str) -> Result<()> {
			let Some(log_id) = parse_log_id_condition(condition) else {
				return Err(PerfTestError::Invalid(format!("unsupported condition: {condition}")));
			};
			self.logs.lock().remove(&log_id);
			Ok(())
		}

		async fn append_records(&self, log_id: &str, records: Vec<Record>) -> Result<()> {
			let mut logs = self.logs.lock();
			let Some(state) = logs.get_mut(log_id) else {
				return Err(PerfTestError::NotExist(format!("log {log_id} not found")));
			};
			for mut record in records {
				record.id = self.next_id();
				state.records.push(record);
			}
			Ok(())
		}

		async fn query_records(&self, req: QueryRecordsRequest) -> Result<QueryRecordsResponse> {
			let logs = self.logs.lock();
			let mut matched: Vec<Record> = Vec::new();
			for log_id in &req.log_ids {
				if let Some(state) = logs.get(log_id) {
					matched.extend(state.records.iter().cloned());
				}
			}
			if req.descending {
				matched.reverse();
			}
			let start_index = if req.start_record_id.is_empty() {
				0
			} else {
				matched
					.iter()
					.position(|r| if req.descending { r.id <= req.start_record_id } else { r.id >= req.start_record_id })
					.unwrap_or(matched.len())
			};
			let limit = if req.limit <= 0 { matched.len() } else { req.limit as usize };
			let page: Vec<Record> = matched.into_iter().skip(start_index).take(limit).collect();
			let next_page_id = if page.len() == limit { page.last().map(|r| r.id.clone()).unwrap_or_default() } else { String::new() };
			Ok(QueryRecordsResponse { records: page, next_page_id })
		}

		async fn query_logs(&self, req: QueryLogsRequest) -> Result<QueryLogsResponse> {
			let logs = self.logs.lock();
			let mut all: Vec<Log> = logs.values().map(|s| s.log.clone()).filter(|l| matches_tag_condition(l, &req.condition)).collect();
			all.sort_by(|a, b| a.id.cmp(&b.id));
			Ok(QueryLogsResponse { logs: all, next_page_id: String::new() })
		}
	}

	fn parse_log_id_condition(condition: &str) -> Option<String> {
		let rest = condition.strip_prefix("logID='")?;
		rest.strip_suffix('\'').map(|s| s.to_string())
	}

	/// Matches `tag("key")="value"`-style conditions (cluster rendezvous
	/// lookups) as well as the plain `key=value` shorthand.
	fn matches_tag_condition(log: &Log, condition: &str) -> bool {
		if condition.is_empty() {
			return true;
		}
		let (key_token, value_token) = if let Some(rest) = condition.strip_prefix("tag(") {
			let Some(close) = rest.find(')') else { return true };
			let Some(value) = rest[close + 1..].strip_prefix('=') else { return true };
			(&rest[..close], value)
		} else {
			let Some((key, value)) = condition.split_once('=') else { return true };
			(key.trim(), value.trim())
		};
		let key = unquote(key_token);
		let value = unquote(value_token);
		log.tags.get(&key).map(|v| v == &value).unwrap_or(false)
	}

	fn unquote(s: &str) -> String {
		serde_json::from_str::<String>(s).unwrap_or_else(|_| s.trim_matches('\'').to_string())
	}
}
