pub mod await_step;
pub mod delay;
pub mod error_step;
pub mod metrics_create;
pub mod metrics_fix;
pub mod parallel;
pub mod pause;
pub mod repeat;
pub mod sequence;
pub mod weighted;

pub use await_step::{AwaitExecutor, AwaitRunner};
pub use delay::{DelayExecutor, DelayRunner};
pub use error_step::{ErrorCfg, ErrorExecutor, ErrorRunner};
pub use metrics_create::{MetricsCreateExecutor, MetricsCreateRunner};
pub use metrics_fix::{MetricsFixExecutor, MetricsFixRunner};
pub use parallel::{ParallelExecutor, ParallelRunner};
pub use pause::{PauseExecutor, PauseRunner};
pub use repeat::{RepeatExecutor, RepeatRunner};
pub use sequence::{SequenceExecutor, SequenceRunner};
pub use weighted::{WeightedExecutor, WeightedRunner};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

pub use crate::config::{Scenario, ScenarioConfig};
use crate::context::Context;
use crate::errors::PerfTestError;
use crate::metrics::{MetricKind, MetricValue};

/// A single, already-configured execution of one scenario step. Built once
/// per position in the tree by `ScenarioExecutor::new_runner` and reused for
/// every invocation at that position (e.g. every `repeat` iteration).
#[async_trait]
pub trait ScenarioRunner: Send + Sync {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult;
}

/// A named scenario kind, registered once in the `Registry`. `new_runner`
/// is called once per tree position at scenario-build time; `prefix` is the
/// dotted tree path used to namespace metric names created under it.
pub trait ScenarioExecutor: Send + Sync {
	fn name(&self) -> &str;
	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner>;
}

/// The outcome of running one step: the (possibly amended) context to hand
/// to whatever runs next, and an optional error. A step that wants to keep
/// going despite a failure should fold the failure into `ctx`'s
/// `skippedErrors` map instead of returning `Err` here.
pub struct ScenarioResult {
	pub ctx: Context,
	pub error: Option<PerfTestError>,
}

impl ScenarioResult {
	pub fn ok(ctx: Context) -> ScenarioResult {
		ScenarioResult { ctx, error: None }
	}

	pub fn err(ctx: Context, error: PerfTestError) -> ScenarioResult {
		ScenarioResult { ctx, error: Some(error) }
	}

	pub fn is_ok(&self) -> bool {
		self.error.is_none()
	}
}

/// Monotonic counter used to give every tree position a distinct metric-name
/// suffix when a scenario doesn't name its own metrics explicitly.
#[derive(Default)]
pub struct RunnerIndex(AtomicU64);

impl RunnerIndex {
	pub fn new() -> RunnerIndex {
		RunnerIndex(AtomicU64::new(0))
	}

	pub fn next(&self) -> u64 {
		self.0.fetch_add(1, Ordering::Relaxed)
	}
}

pub fn get_int_metric(ctx: &Context, name: &str) -> Option<Arc<crate::metrics::Scalar>> {
	match ctx.get_metric(name)? {
		MetricValue::Int(scalar) => Some(scalar),
		_ => None,
	}
}

pub fn get_duration_metric(ctx: &Context, name: &str) -> Option<Arc<crate::metrics::Scalar>> {
	match ctx.get_metric(name)? {
		MetricValue::Duration(scalar) => Some(scalar),
		_ => None,
	}
}

pub fn get_string_metric(ctx: &Context, name: &str) -> Option<Arc<crate::metrics::StringMetric>> {
	match ctx.get_metric(name)? {
		MetricValue::String(metric) => Some(metric),
		_ => None,
	}
}

pub fn get_rate_metric(ctx: &Context, name: &str) -> Option<Arc<crate::metrics::Rate>> {
	match ctx.get_metric(name)? {
		MetricValue::Rps(rate) => Some(rate),
		_ => None,
	}
}

pub fn metric_kind_of(ctx: &Context, name: &str) -> Option<MetricKind> {
	ctx.get_metric(name).map(|v| v.kind())
}
