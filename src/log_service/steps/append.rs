use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{Context, SOLARIS_CLIENT_KEY, SOLARIS_LOG_KEY};
use crate::errors::PerfTestError;
use crate::log_service::Record;
use crate::runner::{get_duration_metric, get_rate_metric, RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};

pub const NAME: &str = "solaris.append";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendCfg {
	#[serde(default)]
	pub message_size: usize,
	#[serde(default)]
	pub batch_size: usize,
	#[serde(default)]
	pub number: i64,
	#[serde(default)]
	pub timeout_metric_name: String,
	#[serde(default)]
	pub msgs_rate_metric_name: String,
	#[serde(default)]
	pub bytes_rate_metric_name: String,
}

pub struct AppendExecutor {
	index: RunnerIndex,
}

impl AppendExecutor {
	pub fn new() -> AppendExecutor {
		AppendExecutor { index: RunnerIndex::new() }
	}
}

impl Default for AppendExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for AppendExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(AppendRunner { name })
	}
}

pub struct AppendRunner {
	name: String,
}

#[async_trait]
impl ScenarioRunner for AppendRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let mut cfg: AppendCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};
		if cfg.batch_size == 0 {
			cfg.batch_size = 1;
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

		let payload = vec![b'z'; cfg.message_size];

		let timeout_metric = get_duration_metric(&ctx, &cfg.timeout_metric_name);
		let msgs_rate_metric = get_rate_metric(&ctx, &cfg.msgs_rate_metric_name);
		let bytes_rate_metric = get_rate_metric(&ctx, &cfg.bytes_rate_metric_name);

		for _ in 0..cfg.number {
			let records: Vec<Record> = (0..cfg.batch_size).map(|_| Record { id: String::new(), payload: payload.clone() }).collect();
			let start = Instant::now();
			if let Err(e) = client.append_records(&log_id, records).await {
				return ScenarioResult::err(ctx, PerfTestError::Internal(format!("failed to append records: {e}")));
			}
			let dur = start.elapsed();
			if let Some(metric) = &timeout_metric {
				metric.add(dur.as_nanos() as i64);
			}
			if let Some(metric) = &msgs_rate_metric {
				metric.add(cfg.batch_size as f64, dur);
			}
			if let Some(metric) = &bytes_rate_metric {
				metric.add((cfg.batch_size * cfg.message_size) as f64, dur);
			}
		}

		ScenarioResult::ok(ctx)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::Value;
	use crate::log_service::fake::InMemoryLogServiceClient;
	use crate::metrics::{MetricKind, MetricValue};
	use tokio_util::sync::CancellationToken;

	#[tokio::test]
	async fn appends_batch_of_zero_filled_records() {
		let client = InMemoryLogServiceClient::new();
		let log = client.create_log(Default::default()).await.unwrap();
		let ctx = Context::new(CancellationToken::new())
			.with_value(SOLARIS_CLIENT_KEY, Value::LogClient(client.clone()))
			.with_value(SOLARIS_LOG_KEY, Value::Str(log.id.clone()))
			.with_value("appendTOs", Value::Metric(MetricValue::new(MetricKind::Duration)));

		let exec = AppendExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&AppendCfg { message_size: 16, batch_size: 3, timeout_metric_name: "appendTOs".to_string(), ..Default::default() });
		let res = runner.run(ctx, &cfg).await;
		assert!(res.is_ok());

		let metric = get_duration_metric(&res.ctx, "appendTOs").unwrap();
		assert_eq!(metric.total(), 1);
	}

	#[tokio::test]
	async fn missing_client_fails() {
		let exec = AppendExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&AppendCfg::default());
		let res = runner.run(Context::new(CancellationToken::new()), &cfg).await;
		assert!(!res.is_ok());
	}

	#[tokio::test]
	async fn issues_number_sequential_calls_and_records_rate_metrics() {
		let client = InMemoryLogServiceClient::new();
		let log = client.create_log(Default::default()).await.unwrap();
		let ctx = Context::new(CancellationToken::new())
			.with_value(SOLARIS_CLIENT_KEY, Value::LogClient(client.clone()))
			.with_value(SOLARIS_LOG_KEY, Value::Str(log.id.clone()))
			.with_value("appendTOs", Value::Metric(MetricValue::new(MetricKind::Duration)))
			.with_value("appendMsgsRate", Value::Metric(MetricValue::new(MetricKind::Rps)))
			.with_value("appendBytesRate", Value::Metric(MetricValue::new(MetricKind::Rps)));

		let exec = AppendExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&AppendCfg {
			message_size: 16,
			batch_size: 2,
			number: 4,
			timeout_metric_name: "appendTOs".to_string(),
			msgs_rate_metric_name: "appendMsgsRate".to_string(),
			bytes_rate_metric_name: "appendBytesRate".to_string(),
		});
		let res = runner.run(ctx, &cfg).await;
		assert!(res.is_ok());

		let timeout_metric = get_duration_metric(&res.ctx, "appendTOs").unwrap();
		assert_eq!(timeout_metric.total(), 4);
	}
}
