use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::errors::{PerfTestError, Result};
use crate::runner::ScenarioExecutor;

/// Process-wide name → executor map. Populated once at startup by `wiring`
/// and read-only thereafter.
#[derive(Default)]
pub struct Registry {
	scenarios: RwLock<HashMap<String, Arc<dyn ScenarioExecutor>>>,
}

impl Registry {
	pub fn new() -> Arc<Registry> {
		Arc::new(Registry { scenarios: RwLock::new(HashMap::new()) })
	}

	pub fn register(&self, executor: Arc<dyn ScenarioExecutor>) -> Result<()> {
		let mut scenarios = self.scenarios.write();
		if scenarios.contains_key(executor.name()) {
			return Err(PerfTestError::Exist(format!("scenario {} is already registered", executor.name())));
		}
		scenarios.insert(executor.name().to_string(), executor);
		Ok(())
	}

	pub fn get(&self, name: &str) -> Option<Arc<dyn ScenarioExecutor>> {
		self.scenarios.read().get(name).cloned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::runner::{ScenarioConfig, ScenarioResult, ScenarioRunner};
	use async_trait::async_trait;
	use crate::context::Context;

	struct NoopRunner;
	#[async_trait]
	impl ScenarioRunner for NoopRunner {
		async fn run(&self, ctx: Context, _config: &ScenarioConfig) -> ScenarioResult {
			ScenarioResult::ok(ctx)
		}
	}

	struct NoopExecutor(&'static str);
	impl ScenarioExecutor for NoopExecutor {
		fn name(&self) -> &str {
			self.0
		}
		fn new_runner(&self, _prefix: &str) -> Arc<dyn ScenarioRunner> {
			Arc::new(NoopRunner)
		}
	}

	#[test]
	fn register_twice_under_same_name_fails_exist() {
		let registry = Registry::new();
		registry.register(Arc::new(NoopExecutor("noop"))).unwrap();
		let err = registry.register(Arc::new(NoopExecutor("noop"))).unwrap_err();
		assert!(matches!(err, PerfTestError::Exist(_)));
	}

	#[test]
	fn register_then_lookup_returns_same_executor() {
		let registry = Registry::new();
		registry.register(Arc::new(NoopExecutor("noop"))).unwrap();
		assert!(registry.get("noop").is_some());
		assert!(registry.get("missing").is_none());
	}
}
