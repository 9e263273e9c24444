use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};
use crate::context::{Context, Value};
use crate::errors::PerfTestError;

pub const NAME: &str = "metricsFix";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MetricsFixCfg {
	pub metrics: Vec<String>,
}

/// Snapshots each named metric (detaching it from further writes by sibling
/// branches) and logs a one-line summary, matching the original's
/// `metricsFix` step used at the tail of a scenario to freeze results before
/// they are reported.
pub struct MetricsFixExecutor {
	index: RunnerIndex,
}

impl MetricsFixExecutor {
	pub fn new() -> MetricsFixExecutor {
		MetricsFixExecutor { index: RunnerIndex::new() }
	}
}

impl Default for MetricsFixExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for MetricsFixExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(MetricsFixRunner { name })
	}
}

pub struct MetricsFixRunner {
	name: String,
}

#[async_trait]
impl ScenarioRunner for MetricsFixRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let cfg: MetricsFixCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};

		let mut next = ctx.clone();
		for metric_name in &cfg.metrics {
			let Some(value) = ctx.get_metric(metric_name) else {
				return ScenarioResult::err(ctx, PerfTestError::NotExist(format!("unknown metric: {metric_name}")));
			};
			let snapshot = value.copy();
			tracing::info!(target: "exec", "{}", snapshot.summary(metric_name));
			next = next.with_value(metric_name.clone(), Value::Metric(snapshot));
		}
		ScenarioResult::ok(next)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::metrics::{MetricKind, MetricValue};
	use tokio_util::sync::CancellationToken;

	#[tokio::test]
	async fn snapshots_named_metrics() {
		let ctx = Context::new(CancellationToken::new())
			.with_value("reqs", Value::Metric(MetricValue::new(MetricKind::Int)));
		if let Some(scalar) = super::super::get_int_metric(&ctx, "reqs") {
			scalar.add(5);
		}
		let exec = MetricsFixExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&MetricsFixCfg { metrics: vec!["reqs".to_string()] });
		let res = runner.run(ctx, &cfg).await;
		assert!(res.is_ok());
	}

	#[tokio::test]
	async fn unknown_metric_fails() {
		let exec = MetricsFixExecutor::new();
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&MetricsFixCfg { metrics: vec!["nope".to_string()] });
		let res = runner.run(Context::new(CancellationToken::new()), &cfg).await;
		assert!(!res.is_ok());
	}
}
