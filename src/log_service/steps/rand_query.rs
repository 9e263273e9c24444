use std::sync::Arc;
use std::time::{Instant, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::context::{Context, SOLARIS_CLIENT_KEY, SOLARIS_LOG_KEY};
use crate::errors::PerfTestError;
use crate::log_service::QueryRecordsRequest;
use crate::runner::{get_duration_metric, get_rate_metric, RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};
use crate::util::{max_ulid, rand_ulid};

pub const NAME: &str = "solaris.randQueryMsgs";

const DEFAULT_QUERY_RECORDS_LIMIT: i64 = 100;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RandQueryMsgsCfg {
	#[serde(default)]
	pub step: i64,
	#[serde(default)]
	pub number: i64,
	#[serde(default)]
	pub timeout_metric_name: String,
	#[serde(default)]
	pub msgs_rate_metric_name: String,
	#[serde(default)]
	pub bytes_rate_metric_name: String,
}

pub struct RandQueryExecutor {
	index: RunnerIndex,
}

impl RandQueryExecutor {
	pub fn new() -> RandQueryExecutor {
		RandQueryExecutor { index: RunnerIndex::new() }
	}
}

impl Default for RandQueryExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for RandQueryExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(RandQueryRunner { name })
	}
}

pub struct RandQueryRunner {
	name: String,
}

fn ulid_to_system_time(id: &str) -> Result<SystemTime, PerfTestError> {
	let parsed = Ulid::from_string(id).map_err(|e| PerfTestError::Invalid(format!("invalid record id {id}: {e}")))?;
	Ok(parsed.datetime())
}

#[async_trait]
impl ScenarioRunner for RandQueryRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let mut cfg: RandQueryMsgsCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};
		if cfg.step == 0 {
			cfg.step = DEFAULT_QUERY_RECORDS_LIMIT;
		}
		if cfg.number <= 0 {
			return ScenarioResult::err(ctx, PerfTestError::Invalid("rand read number should be greater than 0".to_string()));
		}

		let Some(client) = ctx.get_log_client(SOLARIS_CLIENT_KEY) else {
			return ScenarioResult::err(ctx, PerfTestError::NotExist("solaris service not found".to_string()));
		};
		let Some(log_id) = ctx.get_str(SOLARIS_LOG_KEY) else {
			return ScenarioResult::err(ctx, PerfTestError::NotExist("solaris log not found".to_string()));
		};

		let timeout_metric = get_duration_metric(&ctx, &cfg.timeout_metric_name);
		let msgs_rate_metric = get_rate_metric(&ctx, &cfg.msgs_rate_metric_name);
		let bytes_rate_metric = get_rate_metric(&ctx, &cfg.bytes_rate_metric_name);

		let first_req = QueryRecordsRequest { log_ids: vec![log_id.clone()], limit: 1, start_record_id: String::new(), descending: false };
		let first_res = match client.query_records(first_req).await {
			Ok(res) if !res.records.is_empty() => res,
			Ok(_) => return ScenarioResult::err(ctx, PerfTestError::Internal("failed to read first record: no records".to_string())),
			Err(e) => return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed to read first record: {e}"))),
		};
		let from_id = first_res.records[0].id.clone();

		let last_req =
			QueryRecordsRequest { log_ids: vec![log_id.clone()], limit: 1, start_record_id: max_ulid().to_string(), descending: true };
		let last_res = match client.query_records(last_req).await {
			Ok(res) if !res.records.is_empty() => res,
			Ok(_) => return ScenarioResult::err(ctx, PerfTestError::Internal("failed to read last record: no records".to_string())),
			Err(e) => return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed to read last record: {e}"))),
		};
		let to_id = last_res.records[0].id.clone();

		let from = match ulid_to_system_time(&from_id) {
			Ok(t) => t,
			Err(e) => return ScenarioResult::err(ctx, e),
		};
		let to = match ulid_to_system_time(&to_id) {
			Ok(t) => t,
			Err(e) => return ScenarioResult::err(ctx, e),
		};

		for _ in 0..cfg.number {
			let next_id = match rand_ulid(from, to) {
				Ok(id) => id,
				Err(e) => return ScenarioResult::err(ctx, e),
			};
			let req = QueryRecordsRequest { log_ids: vec![log_id.clone()], limit: cfg.step, start_record_id: next_id.to_string(), descending: false };
			let start = Instant::now();
			let res = match client.query_records(req).await {
				Ok(res) => res,
				Err(e) => return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed to query records: {e}"))),
			};
			let dur = start.elapsed();
			if let Some(metric) = &timeout_metric {
				metric.add(dur.as_nanos() as i64);
			}
			if let Some(metric) = &msgs_rate_metric {
				metric.add(res.records.len() as f64, dur);
			}
			if let Some(metric) = &bytes_rate_metric {
				let size: usize = res.records.iter().map(|r| r.payload.len()).sum();
				metric.add(size as f64, dur);
			}
		}

		ScenarioResult::ok(ctx)
	}
}
