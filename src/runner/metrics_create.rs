use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{RunnerIndex, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};
use crate::context::{Context, Value};
use crate::errors::PerfTestError;
use crate::metrics::{MetricKind, MetricValue};

pub const NAME: &str = "metricsCreate";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MetricsCreateCfg {
	pub metrics: BTreeMap<MetricKind, Vec<String>>,
}

pub struct MetricsCreateExecutor {
	index: RunnerIndex,
}

impl MetricsCreateExecutor {
	pub fn new() -> MetricsCreateExecutor {
		MetricsCreateExecutor { index: RunnerIndex::new() }
	}
}

impl Default for MetricsCreateExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl ScenarioExecutor for MetricsCreateExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(MetricsCreateRunner { name })
	}
}

pub struct MetricsCreateRunner {
	name: String,
}

#[async_trait]
impl ScenarioRunner for MetricsCreateRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let cfg: MetricsCreateCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};

		let mut next = ctx.clone();
		for (kind, names) in cfg.metrics {
			for metric_name in names {
				next = next.with_value(metric_name, Value::Metric(MetricValue::new(kind)));
			}
		}
		ScenarioResult::ok(next)
	}
}
