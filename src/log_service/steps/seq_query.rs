use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{Context, SOLARIS_CLIENT_KEY, SOLARIS_LOG_KEY};
use crate::errors::PerfTestError;
use crate::log_service::QueryRecordsRequest;
use crate::runner::{get_duration_metric, get_rate_metric, RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};

pub const NAME: &str = "solaris.seqQueryMsgs";

const DEFAULT_QUERY_RECORDS_LIMIT: i64 = 100;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeqQueryMsgsCfg {
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

pub struct SeqQueryExecutor {
	index: RunnerIndex,
}

impl SeqQueryExecutor {
	pub fn new() -> SeqQueryExecutor {
		SeqQueryExecutor { index: RunnerIndex::new() }
	}
}

impl Default for SeqQueryExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for SeqQueryExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(SeqQueryRunner { name })
	}
}

pub struct SeqQueryRunner {
	name: String,
}

#[async_trait]
impl ScenarioRunner for SeqQueryRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let mut cfg: SeqQueryMsgsCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};
		if cfg.step == 0 {
			cfg.step = DEFAULT_QUERY_RECORDS_LIMIT;
		}
		if cfg.number == 0 {
			cfg.number = 1;
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

		let mut from_id = String::new();
		let mut i: i64 = 0;
		loop {
			if cfg.number != -1 && i >= cfg.number {
				break;
			}
			let req = QueryRecordsRequest { log_ids: vec![log_id.clone()], limit: cfg.step, start_record_id: from_id.clone(), descending: false };
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

			from_id = res.next_page_id;
			if from_id.is_empty() {
				break;
			}
			i += 1;
		}

		ScenarioResult::ok(ctx)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::Value;
	use crate::log_service::fake::InMemoryLogServiceClient;
	use crate::log_service::Record;
	use crate::metrics::{MetricKind, MetricValue};
	use tokio_util::sync::CancellationToken;

	#[tokio::test]
	async fn walks_all_pages_until_exhausted() {
		let client = InMemoryLogServiceClient::new();
		let log = client.create_log(Default::default()).await.unwrap();
		client.append_records(&log.id, (0..5).map(|_| Record { id: String::new(), payload: vec![1, 2, 3] }).collect()).await.unwrap();

		let ctx = Context::new(CancellationToken::new())
			.with_value(SOLARIS_CLIENT_KEY, Value::LogClient(client))
			.with_value(SOLARIS_LOG_KEY, Value::Str(log.id))
			.with_value("to", Value::Metric(MetricValue::new(MetricKind::Duration)));

		let exec = SeqQueryExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&SeqQueryMsgsCfg { step: 2, number: -1, timeout_metric_name: "to".to_string(), ..Default::default() });
		let res = runner.run(ctx, &cfg).await;
		assert!(res.is_ok());
		let metric = get_duration_metric(&res.ctx, "to").unwrap();
		assert!(metric.total() >= 3);
	}

	#[tokio::test]
	async fn missing_log_fails() {
		let client = InMemoryLogServiceClient::new();
		let ctx = Context::new(CancellationToken::new()).with_value(SOLARIS_CLIENT_KEY, Value::LogClient(client));
		let exec = SeqQueryExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&SeqQueryMsgsCfg::default());
		let res = runner.run(ctx, &cfg).await;
		assert!(!res.is_ok());
	}
}
