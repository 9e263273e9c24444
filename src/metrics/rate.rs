use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One bucketed sample: `s` is the bucket index (a time instant divided by
/// `scale`), `v` is the accumulated value in that bucket, `d` is the wall
/// time of the bucket actually covered by samples (never more than `scale`).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Sample {
	pub s: i64,
	pub v: f64,
	#[serde(with = "duration_millis")]
	pub d: Duration,
}

mod duration_millis {
	use super::Duration;
	use serde::{Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
		(d.as_millis() as u64).serialize(ser)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
		let millis = u64::deserialize(de)?;
		Ok(Duration::from_millis(millis))
	}
}

/// A histogram of samples bucketed by a fixed `scale` (e.g. one second).
/// `add` splits a `(value, duration)` observation across every bucket the
/// covered interval `[now-duration, now]` intersects, weighted by the
/// fraction of `duration` falling in each bucket. Mutex-protected: splicing
/// samples isn't representable as a single atomic cell.
pub struct Rate {
	scale: Duration,
	samples: Mutex<HashMap<i64, Sample>>,
}

fn now_nanos() -> i64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as i64
}

impl Rate {
	pub fn new(scale: Duration) -> Arc<Self> {
		Arc::new(Rate { scale, samples: Mutex::new(HashMap::new()) })
	}

	pub fn scale(&self) -> Duration {
		self.scale
	}

	pub fn add(&self, value: f64, duration: Duration) {
		let scale_nanos = self.scale.as_nanos().max(1) as i64;
		let now = now_nanos();
		let mut samples = self.samples.lock();

		if duration.is_zero() {
			let bucket = now.div_euclid(scale_nanos);
			merge_into(&mut samples, bucket, value, Duration::ZERO, self.scale);
			return;
		}

		let start = now - duration.as_nanos() as i64;
		let total_nanos = duration.as_nanos() as f64;
		let first_bucket = start.div_euclid(scale_nanos);
		let last_bucket = (now - 1).div_euclid(scale_nanos);
		for bucket in first_bucket..=last_bucket {
			let bucket_start = bucket * scale_nanos;
			let bucket_end = bucket_start + scale_nanos;
			let overlap_start = start.max(bucket_start);
			let overlap_end = now.min(bucket_end);
			let overlap = (overlap_end - overlap_start).max(0);
			if overlap == 0 {
				continue;
			}
			let frac = overlap as f64 / total_nanos;
			merge_into(
				&mut samples,
				bucket,
				value * frac,
				Duration::from_nanos(overlap as u64),
				self.scale,
			);
		}
	}

	/// Aggregate rate: total value per `scale` unit of covered wall time.
	pub fn rate(&self) -> f64 {
		let samples = self.samples.lock();
		rate_of(samples.values().copied(), self.scale)
	}

	pub fn copy(&self) -> Arc<Rate> {
		let samples = self.samples.lock().clone();
		Arc::new(Rate { scale: self.scale, samples: Mutex::new(samples) })
	}

	pub fn to_result(&self) -> RateMetricResult {
		let samples = self.samples.lock();
		let mut v: Vec<Sample> = samples.values().copied().collect();
		v.sort_by_key(|s| s.s);
		RateMetricResult { scale: self.scale, samples: v }
	}

	pub fn from_result(r: &RateMetricResult) -> Arc<Rate> {
		let rate = Rate::new(r.scale);
		{
			let mut samples = rate.samples.lock();
			for s in &r.samples {
				samples.insert(s.s, *s);
			}
		}
		rate
	}
}

fn merge_into(samples: &mut HashMap<i64, Sample>, bucket: i64, v: f64, d: Duration, scale: Duration) {
	samples
		.entry(bucket)
		.and_modify(|s| {
			s.v += v;
			s.d = (s.d + d).min(scale);
		})
		.or_insert(Sample { s: bucket, v, d: d.min(scale) });
}

fn rate_of(samples: impl Iterator<Item = Sample>, scale: Duration) -> f64 {
	let (sum_v, sum_d) = samples.fold((0f64, 0f64), |(sv, sd), s| (sv + s.v, sd + s.d.as_nanos() as f64));
	if sum_d == 0.0 {
		return 0.0;
	}
	sum_v / sum_d * scale.as_nanos() as f64
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RateMetricResult {
	#[serde(with = "duration_millis")]
	pub scale: Duration,
	pub samples: Vec<Sample>,
}

impl RateMetricResult {
	pub fn rate(&self) -> f64 {
		rate_of(self.samples.iter().copied(), self.scale)
	}

	/// Merge two same-scale results: same-bucket samples add, with the
	/// merged bucket's covered duration capped at `scale`.
	pub fn merge(&self, other: &RateMetricResult) -> RateMetricResult {
		let mut by_bucket: HashMap<i64, Sample> = HashMap::new();
		for s in self.samples.iter().chain(other.samples.iter()) {
			merge_into(&mut by_bucket, s.s, s.v, s.d, self.scale);
		}
		let mut samples: Vec<Sample> = by_bucket.into_values().collect();
		samples.sort_by_key(|s| s.s);
		RateMetricResult { scale: self.scale, samples }
	}
}
