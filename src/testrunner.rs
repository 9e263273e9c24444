use std::sync::Arc;

use anyhow::anyhow;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::context::Context;
use crate::errors::PerfTestError;
use crate::registry::Registry;

/// Runs every named test in `cfg.tests` sequentially against `registry`,
/// logging pass/fail and any errors a step absorbed via `skipErrors`.
pub struct TestRunner {
	registry: Arc<Registry>,
	cancel: CancellationToken,
}

impl TestRunner {
	pub fn new(registry: Arc<Registry>, cancel: CancellationToken) -> TestRunner {
		TestRunner { registry, cancel }
	}

	pub async fn run(&self, cfg: &Config) -> anyhow::Result<()> {
		tracing::info!("Start tests");
		for (i, (key, test)) in cfg.tests.iter().enumerate() {
			let n = i + 1;
			tracing::info!(test = n, name = %test.name, key, "test started");

			let Some(executor) = self.registry.get(&test.scenario.name) else {
				return Err(anyhow!("cannot find scenario runner {}", test.scenario.name));
			};
			let runner = executor.new_runner("");
			let ctx = Context::new(self.cancel.clone());
			let result = runner.run(ctx, &test.scenario.config).await;

			match result.error {
				Some(err) => tracing::error!(target: "exec", test = n, name = %test.name, error = %err, "test failed"),
				None => {
					tracing::info!(target: "exec", test = n, name = %test.name, "test passed");
					for (runner_path, err) in result.ctx.skipped_errors() {
						tracing::info!(target: "exec", runner = %runner_path, error = %err, "skipped error");
					}
				},
			}
		}
		tracing::info!("Tests ended");
		Ok(())
	}
}
