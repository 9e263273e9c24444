use std::sync::Arc;

use crate::cluster::steps as cluster_steps;
use crate::errors::Result;
use crate::log_service::steps as solaris_steps;
use crate::registry::Registry;
use crate::runner::*;

/// Registers every built-in scenario executor under its fixed name. Called
/// once at startup before any test runs.
pub fn build_registry() -> Result<Arc<Registry>> {
	let registry = Registry::new();

	registry.register(Arc::new(SequenceExecutor::new(registry.clone())))?;
	registry.register(Arc::new(ParallelExecutor::new(registry.clone())))?;
	registry.register(Arc::new(WeightedExecutor::new(registry.clone())))?;
	registry.register(Arc::new(RepeatExecutor::new(registry.clone())))?;
	registry.register(Arc::new(PauseExecutor::new()))?;
	registry.register(Arc::new(DelayExecutor::new()))?;
	registry.register(Arc::new(AwaitExecutor::new()))?;
	registry.register(Arc::new(ErrorExecutor::new()))?;
	registry.register(Arc::new(MetricsCreateExecutor::new()))?;
	registry.register(Arc::new(MetricsFixExecutor::new()))?;

	registry.register(Arc::new(solaris_steps::ConnectExecutor::new()))?;
	registry.register(Arc::new(solaris_steps::CreateLogExecutor::new()))?;
	registry.register(Arc::new(solaris_steps::DeleteLogExecutor::new()))?;
	registry.register(Arc::new(solaris_steps::AppendExecutor::new()))?;
	registry.register(Arc::new(solaris_steps::SeqQueryExecutor::new()))?;
	registry.register(Arc::new(solaris_steps::RandQueryExecutor::new()))?;

	registry.register(Arc::new(cluster_steps::ConnectExecutor::new()))?;
	registry.register(Arc::new(cluster_steps::FinishExecutor::new()))?;
	registry.register(Arc::new(cluster_steps::DeleteExecutor::new()))?;

	Ok(registry)
}
