mod rate;
mod result;
mod scalar;
mod string_metric;

pub use rate::{Rate, RateMetricResult, Sample};
pub use result::{DurationResult, IntResult, MetricKind, MetricResult, MetricValue, StringResult};
pub use scalar::Scalar;
pub use string_metric::StringMetric;
