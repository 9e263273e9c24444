use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::rate::{Rate, RateMetricResult};
use super::scalar::Scalar;
use super::string_metric::StringMetric;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKind {
	#[serde(rename = "INT")]
	Int,
	#[serde(rename = "DURATION")]
	Duration,
	#[serde(rename = "STRING")]
	String,
	#[serde(rename = "RPS")]
	Rps,
}

/// A live metric handle bound into a `Context`. `Int`/`Duration` share the
/// same `Scalar` primitive (nanosecond sums for `Duration`), mirroring the
/// original's reuse of `Scalar[int64]` for both kinds.
#[derive(Clone)]
pub enum MetricValue {
	Int(Arc<Scalar>),
	Duration(Arc<Scalar>),
	String(Arc<StringMetric>),
	Rps(Arc<Rate>),
}

impl MetricValue {
	pub fn new(kind: MetricKind) -> MetricValue {
		match kind {
			MetricKind::Int => MetricValue::Int(Scalar::new()),
			MetricKind::Duration => MetricValue::Duration(Scalar::new()),
			MetricKind::String => MetricValue::String(StringMetric::new()),
			MetricKind::Rps => MetricValue::Rps(Rate::new(std::time::Duration::from_secs(1))),
		}
	}

	pub fn kind(&self) -> MetricKind {
		match self {
			MetricValue::Int(_) => MetricKind::Int,
			MetricValue::Duration(_) => MetricKind::Duration,
			MetricValue::String(_) => MetricKind::String,
			MetricValue::Rps(_) => MetricKind::Rps,
		}
	}

	pub fn as_int(&self) -> Option<&Arc<Scalar>> {
		match self {
			MetricValue::Int(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_duration(&self) -> Option<&Arc<Scalar>> {
		match self {
			MetricValue::Duration(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_string(&self) -> Option<&Arc<StringMetric>> {
		match self {
			MetricValue::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_rps(&self) -> Option<&Arc<Rate>> {
		match self {
			MetricValue::Rps(r) => Some(r),
			_ => None,
		}
	}

	/// Snapshot this metric, detaching the copy from future writes.
	pub fn copy(&self) -> MetricValue {
		match self {
			MetricValue::Int(s) => MetricValue::Int(s.copy()),
			MetricValue::Duration(s) => MetricValue::Duration(s.copy()),
			MetricValue::String(s) => MetricValue::String(s.copy()),
			MetricValue::Rps(r) => MetricValue::Rps(r.copy()),
		}
	}

	pub fn to_result(&self) -> MetricResult {
		match self {
			MetricValue::Int(s) => MetricResult::Int(IntResult { total: s.total(), sum: s.sum(), mean: s.mean() as i64 }),
			MetricValue::Duration(s) => {
				MetricResult::Duration(DurationResult { total: s.total(), sum_nanos: s.sum(), mean_nanos: s.mean() as i64 })
			},
			MetricValue::String(s) => MetricResult::String(StringResult { total: s.total(), sum: s.value() }),
			MetricValue::Rps(r) => MetricResult::Rps(r.to_result()),
		}
	}

	pub fn summary(&self, name: &str) -> String {
		match self.to_result() {
			MetricResult::Int(r) => format!("{name}: {{total: {}, sum: {}, mean: {}}}", r.total, r.sum, r.mean),
			MetricResult::Duration(r) => format!(
				"{name}: {{total: {}, sum: {:?}, mean: {:?}}}",
				r.total,
				std::time::Duration::from_nanos(r.sum_nanos.max(0) as u64),
				std::time::Duration::from_nanos(r.mean_nanos.max(0) as u64)
			),
			MetricResult::String(r) => format!("{name}: {{total: {}, value: {}}}", r.total, r.sum),
			MetricResult::Rps(r) => format!("{name}: {{rate: {:.2}}}", r.rate()),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntResult {
	pub total: i64,
	pub sum: i64,
	pub mean: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DurationResult {
	pub total: i64,
	#[serde(rename = "sum")]
	pub sum_nanos: i64,
	#[serde(rename = "mean")]
	pub mean_nanos: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StringResult {
	pub total: i64,
	pub sum: String,
}

/// Polymorphic metric result: a tagged union over the closed set of kinds,
/// serialised as `{"type": "...", "result": {...}}` to match the wire
/// format's node-result record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "result")]
pub enum MetricResult {
	#[serde(rename = "INT")]
	Int(IntResult),
	#[serde(rename = "DURATION")]
	Duration(DurationResult),
	#[serde(rename = "STRING")]
	String(StringResult),
	#[serde(rename = "RPS")]
	Rps(RateMetricResult),
}

impl MetricResult {
	pub fn kind(&self) -> MetricKind {
		match self {
			MetricResult::Int(_) => MetricKind::Int,
			MetricResult::Duration(_) => MetricKind::Duration,
			MetricResult::String(_) => MetricKind::String,
			MetricResult::Rps(_) => MetricKind::Rps,
		}
	}

	/// Merge two same-kind results: sum/count add, mean is recomputed, rate
	/// samples are bucket-merged.
	pub fn merge(&self, other: &MetricResult) -> crate::errors::Result<MetricResult> {
		match (self, other) {
			(MetricResult::Int(a), MetricResult::Int(b)) => {
				let total = a.total + b.total;
				let sum = a.sum + b.sum;
				let mean = if total > 0 { sum / total } else { 0 };
				Ok(MetricResult::Int(IntResult { total, sum, mean }))
			},
			(MetricResult::Duration(a), MetricResult::Duration(b)) => {
				let total = a.total + b.total;
				let sum_nanos = a.sum_nanos + b.sum_nanos;
				let mean_nanos = if total > 0 { sum_nanos / total } else { 0 };
				Ok(MetricResult::Duration(DurationResult { total, sum_nanos, mean_nanos }))
			},
			(MetricResult::String(a), MetricResult::String(b)) => Ok(MetricResult::String(StringResult {
				total: a.total + b.total,
				sum: format!("{}{}", a.sum, b.sum),
			})),
			(MetricResult::Rps(a), MetricResult::Rps(b)) => Ok(MetricResult::Rps(a.merge(b))),
			_ => Err(crate::errors::PerfTestError::Invalid(format!(
				"cannot merge metric results of kind {:?} and {:?}",
				self.kind(),
				other.kind()
			))),
		}
	}
}
