use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// `(count, concatenation)`. Concatenation isn't representable as a single
/// atomic cell, so appends serialize under a mutex — same "hint, not
/// transaction" contract as `Scalar`.
pub struct StringMetric {
	total: AtomicI64,
	value: Mutex<String>,
}

impl StringMetric {
	pub fn new() -> Arc<Self> {
		Arc::new(StringMetric { total: AtomicI64::new(0), value: Mutex::new(String::new()) })
	}

	pub fn add(&self, value: &str) {
		self.total.fetch_add(1, Ordering::SeqCst);
		self.value.lock().push_str(value);
	}

	pub fn total(&self) -> i64 {
		self.total.load(Ordering::SeqCst)
	}

	pub fn value(&self) -> String {
		self.value.lock().clone()
	}

	pub fn copy(&self) -> Arc<StringMetric> {
		Arc::new(StringMetric {
			total: AtomicI64::new(self.total.load(Ordering::SeqCst)),
			value: Mutex::new(self.value.lock().clone()),
		})
	}
}
