use std::any::Any;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cluster::{Cluster, Node};
use crate::log_service::LogServiceClient;
use crate::metrics::MetricValue;

/// Context key under which skipped-error maps accumulate.
pub const SKIPPED_ERRORS_KEY: &str = "skippedErrors";

/// A context binding. The known shapes get their own variant; anything else
/// (user-named ad hoc bindings) goes through `Any`.
#[derive(Clone)]
pub enum Value {
	Str(String),
	Int(i64),
	LogClient(Arc<dyn LogServiceClient>),
	Cluster(Arc<dyn Cluster>),
	Node(Arc<dyn Node>),
	Metric(MetricValue),
	/// A sub-context's cancellation signal, awaited by `await`.
	Trigger(CancellationToken),
	SkippedErrors(imbl::HashMap<String, Arc<str>>),
	Any(Arc<dyn Any + Send + Sync>),
}

/// An immutable, cancellable key/value scope threaded through the scenario
/// tree. Cloning is O(1) thanks to `imbl`'s structural sharing; a clone made
/// for a parallel branch and a clone kept by its sibling share all unchanged
/// structure.
#[derive(Clone)]
pub struct Context {
	values: imbl::HashMap<String, Value>,
	cancel: CancellationToken,
}

impl Context {
	pub fn new(cancel: CancellationToken) -> Self {
		let mut values = imbl::HashMap::new();
		values.insert(SKIPPED_ERRORS_KEY.to_string(), Value::SkippedErrors(imbl::HashMap::new()));
		Context { values, cancel }
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	pub fn cancellation_token(&self) -> CancellationToken {
		self.cancel.clone()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.values.get(key)
	}

	/// Last-writer-wins insert, returning the derived context.
	pub fn with_value(&self, key: impl Into<String>, value: Value) -> Context {
		let mut next = self.clone();
		next.values.insert(key.into(), value);
		next
	}

	/// Insert only if `key` is not already bound; otherwise return an
	/// unchanged clone. Used by connect/createLog/cluster.connect, whose
	/// results must not clobber a binding an outer scope already set.
	pub fn with_value_if_absent(&self, key: &str, value: Value) -> Context {
		if self.values.contains_key(key) {
			self.clone()
		} else {
			self.with_value(key, value)
		}
	}

	pub fn without_value(&self, key: &str) -> Context {
		let mut next = self.clone();
		next.values.remove(key);
		next
	}

	/// Combines this context with `other`, the result of a sibling branch
	/// that diverged from `base` (as parallel branches do). Bindings `other`
	/// introduced or changed are layered on top of this context's;
	/// `skippedErrors` entries from both sides are merged rather than one
	/// side's map replacing the other's.
	///
	/// `Value::Int` bindings are treated as accumulators rather than plain
	/// overwrites: `other`'s delta relative to `base` (the point every
	/// branch diverged from) is added to this context's own running total,
	/// so N branches that each bump the same counter by one really do sum
	/// to N once every branch has been folded in. Every other value kind is
	/// last-writer-wins, matching a branch that simply replaces a binding.
	pub fn merge(&self, other: &Context, base: &Context) -> Context {
		let mut merged = self.clone();
		for (key, value) in other.values.iter() {
			if key.as_str() == SKIPPED_ERRORS_KEY {
				continue;
			}
			match value {
				Value::Int(v) => {
					let base_v = base.get_int(key).unwrap_or(0);
					let delta = v - base_v;
					let running = merged.get_int(key).unwrap_or(base_v);
					merged.values.insert(key.clone(), Value::Int(running + delta));
				},
				_ => {
					merged.values.insert(key.clone(), value.clone());
				},
			}
		}
		let mut skipped = self.skipped_errors();
		for (path, err) in other.skipped_errors() {
			skipped.insert(path, err);
		}
		merged.values.insert(SKIPPED_ERRORS_KEY.to_string(), Value::SkippedErrors(skipped));
		merged
	}

	pub fn skipped_errors(&self) -> imbl::HashMap<String, Arc<str>> {
		match self.values.get(SKIPPED_ERRORS_KEY) {
			Some(Value::SkippedErrors(m)) => m.clone(),
			_ => imbl::HashMap::new(),
		}
	}

	pub fn with_skipped_error(&self, path: impl Into<String>, err: impl Into<Arc<str>>) -> Context {
		let mut m = self.skipped_errors();
		m.insert(path.into(), err.into());
		self.with_value(SKIPPED_ERRORS_KEY, Value::SkippedErrors(m))
	}

	pub fn get_str(&self, key: &str) -> Option<String> {
		match self.values.get(key) {
			Some(Value::Str(s)) => Some(s.clone()),
			_ => None,
		}
	}

	pub fn get_log_client(&self, key: &str) -> Option<Arc<dyn LogServiceClient>> {
		match self.values.get(key) {
			Some(Value::LogClient(c)) => Some(c.clone()),
			_ => None,
		}
	}

	pub fn get_cluster(&self, key: &str) -> Option<Arc<dyn Cluster>> {
		match self.values.get(key) {
			Some(Value::Cluster(c)) => Some(c.clone()),
			_ => None,
		}
	}

	pub fn get_node(&self, key: &str) -> Option<Arc<dyn Node>> {
		match self.values.get(key) {
			Some(Value::Node(n)) => Some(n.clone()),
			_ => None,
		}
	}

	pub fn get_trigger(&self, key: &str) -> Option<CancellationToken> {
		match self.values.get(key) {
			Some(Value::Trigger(t)) => Some(t.clone()),
			_ => None,
		}
	}

	pub fn get_int(&self, key: &str) -> Option<i64> {
		match self.values.get(key) {
			Some(Value::Int(v)) => Some(*v),
			_ => None,
		}
	}

	pub fn get_metric(&self, key: &str) -> Option<MetricValue> {
		match self.values.get(key) {
			Some(Value::Metric(m)) => Some(m.clone()),
			_ => None,
		}
	}
}

pub const SOLARIS_CLIENT_KEY: &str = "solarisClnt";
pub const SOLARIS_LOG_KEY: &str = "solarisLog";
pub const CLUSTER_CLIENT_KEY: &str = "clusterClnt";
pub const CLUSTER_NODE_KEY: &str = "clusterNode";
pub const PAUSE_RUNNERS_COUNTER_KEY: &str = "pauseRunnersCounter";
