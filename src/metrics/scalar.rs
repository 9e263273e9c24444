use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// A concurrent `(count, sum)` pair updated via independent CAS loops on two
/// atomic cells. `copy` reads each cell once, so a reader may observe a
/// `(count, sum)` pair that never existed together — acceptable because
/// downstream consumers treat it as a snapshot hint, not a transactional read.
pub struct Scalar {
	total: AtomicI64,
	// sum is stored as f64 bits so the same primitive serves both the INT
	// and DURATION (nanoseconds) metric kinds without a generic parameter.
	sum_bits: AtomicU64,
}

impl Scalar {
	pub fn new() -> Arc<Self> {
		Arc::new(Scalar { total: AtomicI64::new(0), sum_bits: AtomicU64::new(0f64.to_bits()) })
	}

	pub fn add(&self, v: i64) {
		self.total.fetch_add(1, Ordering::SeqCst);
		let mut cur = self.sum_bits.load(Ordering::SeqCst);
		loop {
			let next = (f64::from_bits(cur) + v as f64).to_bits();
			match self.sum_bits.compare_exchange_weak(
				cur,
				next,
				Ordering::SeqCst,
				Ordering::SeqCst,
			) {
				Ok(_) => break,
				Err(observed) => cur = observed,
			}
		}
	}

	pub fn total(&self) -> i64 {
		self.total.load(Ordering::SeqCst)
	}

	pub fn sum(&self) -> i64 {
		f64::from_bits(self.sum_bits.load(Ordering::SeqCst)) as i64
	}

	pub fn mean(&self) -> f64 {
		let total = self.total();
		if total == 0 {
			return 0.0;
		}
		f64::from_bits(self.sum_bits.load(Ordering::SeqCst)) / total as f64
	}

	pub fn copy(&self) -> Arc<Scalar> {
		Arc::new(Scalar {
			total: AtomicI64::new(self.total.load(Ordering::SeqCst)),
			sum_bits: AtomicU64::new(self.sum_bits.load(Ordering::SeqCst)),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc as StdArc;

	#[tokio::test]
	async fn concurrent_add_is_linearizable_on_totals() {
		let s = Scalar::new();
		let mut set = tokio::task::JoinSet::new();
		for i in 0..100i64 {
			let s = StdArc::clone(&s);
			set.spawn(async move { s.add(i) });
		}
		while set.join_next().await.is_some() {}
		assert_eq!(s.total(), 100);
		assert_eq!(s.sum(), (0..100).sum::<i64>());
		let snap = s.copy();
		assert_eq!(snap.mean(), s.sum() as f64 / s.total() as f64);
	}
}
