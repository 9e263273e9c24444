use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinSet;

use super::{RunnerIndex, Scenario, ScenarioConfig, ScenarioExecutor, ScenarioResult, ScenarioRunner};
use crate::context::Context;
use crate::errors::PerfTestError;
use crate::registry::Registry;

pub const NAME: &str = "parallel";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelCfg {
	#[serde(default)]
	pub skip_errors: bool,
	pub steps: Vec<Scenario>,
}

pub struct ParallelExecutor {
	registry: Arc<Registry>,
	index: RunnerIndex,
}

impl ParallelExecutor {
	pub fn new(registry: Arc<Registry>) -> ParallelExecutor {
		ParallelExecutor { registry, index: RunnerIndex::new() }
	}
}

impl ScenarioExecutor for ParallelExecutor {
	fn name(&self) -> &str {
		NAME
	}

	fn new_runner(&self, prefix: &str) -> Arc<dyn ScenarioRunner> {
		let name = format!("{prefix}/{NAME}-{}", self.index.next());
		Arc::new(ParallelRunner {
			registry: self.registry.clone(),
			name,
			step_count: AtomicUsize::new(0),
			joins: Mutex::new(JoinSet::new()),
			closed: AtomicBool::new(false),
		})
	}
}

/// Fires every configured step concurrently and joins on all of them. Branch
/// contexts are merged back into the parent deterministically in step-index
/// order (the original merges in Go map-iteration order, which is
/// unspecified — this crate's ordering is a deliberate improvement so a test
/// run is reproducible).
///
/// While the join barrier is still open, additional branches can be
/// attached with [`ParallelRunner::add_scenario`]; once every branch known at
/// the time has drained, the barrier closes and later calls are refused,
/// mirroring the original's `addStep`/`AddScenario`.
pub struct ParallelRunner {
	registry: Arc<Registry>,
	name: String,
	step_count: AtomicUsize,
	joins: Mutex<JoinSet<(usize, ScenarioResult)>>,
	closed: AtomicBool,
}

impl ParallelRunner {
	/// Attaches a new branch to a still-running parallel. Returns a receiver
	/// that resolves with the branch's own result, independent of whether the
	/// caller is also waiting on the overall `run()` future. Refuses with
	/// `PerfTestError::Closed` once the join barrier has already fired.
	pub fn add_scenario(&self, ctx: Context, step: Scenario) -> Result<oneshot::Receiver<ScenarioResult>, PerfTestError> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(PerfTestError::Closed);
		}
		let index = self.step_count.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();

		let mut joins = self.joins.lock().unwrap();
		// Re-check under the lock: run()'s drain loop closes the barrier only
		// while holding this same lock, so this is the authoritative gate.
		if self.closed.load(Ordering::SeqCst) {
			return Err(PerfTestError::Closed);
		}
		self.spawn_branch(&mut joins, index, ctx, step, Some(tx));
		Ok(rx)
	}

	fn spawn_branch(
		&self,
		joins: &mut JoinSet<(usize, ScenarioResult)>,
		index: usize,
		ctx: Context,
		step: Scenario,
		notify: Option<oneshot::Sender<ScenarioResult>>,
	) {
		let Some(executor) = self.registry.get(&step.name) else {
			let result = ScenarioResult::err(ctx, PerfTestError::NotExist(format!("failed to get runner for step {}", step.name)));
			if let Some(tx) = notify {
				let _ = tx.send(ScenarioResult { ctx: result.ctx.clone(), error: result.error.as_ref().map(|e| PerfTestError::Internal(e.to_string())) });
			}
			joins.spawn(async move { (index, result) });
			return;
		};
		let runner = executor.new_runner(&self.name);
		let step_config = step.config;
		joins.spawn(async move {
			let result = runner.run(ctx, &step_config).await;
			if let Some(tx) = notify {
				let echo = ScenarioResult { ctx: result.ctx.clone(), error: result.error.as_ref().map(|e| PerfTestError::Internal(e.to_string())) };
				let _ = tx.send(echo);
			}
			(index, result)
		});
	}
}

#[async_trait]
impl ScenarioRunner for ParallelRunner {
	async fn run(&self, ctx: Context, config: &ScenarioConfig) -> ScenarioResult {
		tracing::debug!(runner = %self.name, "running scenario");
		if ctx.is_cancelled() {
			return ScenarioResult::err(ctx, PerfTestError::Closed);
		}
		let cfg: ParallelCfg = match config.decode() {
			Ok(cfg) => cfg,
			Err(e) => return ScenarioResult::err(ctx, e),
		};

		{
			let mut joins = self.joins.lock().unwrap();
			for step in cfg.steps {
				let index = self.step_count.fetch_add(1, Ordering::SeqCst);
				let branch_ctx = ctx.clone();
				self.spawn_branch(&mut joins, index, branch_ctx, step, None);
			}
		}

		// Drain without holding the lock across an await, so a concurrent
		// add_scenario() can still push into the same JoinSet. The barrier
		// only closes once the set is observed empty twice in a row under
		// the lock, accepting the same benign race as the original: a
		// branch added right as the set goes empty is let in.
		let mut results: Vec<(usize, ScenarioResult)> = Vec::new();
		loop {
			let popped = {
				let mut joins = self.joins.lock().unwrap();
				joins.try_join_next()
			};
			match popped {
				Some(Ok(pair)) => results.push(pair),
				Some(Err(e)) => results.push((usize::MAX, ScenarioResult::err(ctx.clone(), PerfTestError::Internal(format!("branch task panicked: {e}"))))),
				None => {
					let empty = self.joins.lock().unwrap().is_empty();
					if !empty {
						tokio::task::yield_now().await;
						continue;
					}
					self.closed.store(true, Ordering::SeqCst);
					if self.joins.lock().unwrap().is_empty() {
						break;
					}
					self.closed.store(false, Ordering::SeqCst);
				},
			}
		}
		results.sort_by_key(|(index, _)| *index);

		let mut merged = ctx.clone();
		let mut failure: Option<String> = None;
		for (index, result) in results {
			match result.error {
				None => merged = merged.merge(&result.ctx, &ctx),
				Some(err) if cfg.skip_errors => {
					merged = merged.merge(&result.ctx, &ctx);
					merged = merged.with_skipped_error(format!("{}/step[{index}]", self.name), err.to_string());
				},
				Some(err) => {
					let msg = format!("failed parallel step index[{index}] caused by: {err}");
					failure = Some(match failure {
						Some(prev) => format!("{prev},\n{{{msg}}}"),
						None => format!("{{{msg}}}"),
					});
				},
			}
		}

		match failure {
			Some(msg) if !cfg.skip_errors => ScenarioResult::err(ctx, PerfTestError::Internal(msg)),
			_ => ScenarioResult::ok(merged),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::runner::{ErrorExecutor, PauseExecutor};
	use tokio_util::sync::CancellationToken;

	fn registry() -> Arc<Registry> {
		let registry = Registry::new();
		registry.register(Arc::new(PauseExecutor::new())).unwrap();
		registry.register(Arc::new(ErrorExecutor::new())).unwrap();
		registry
	}

	#[tokio::test]
	async fn all_steps_succeed() {
		let registry = registry();
		let exec = ParallelExecutor::new(registry);
		let runner = exec.new_runner("root");
		let steps = vec![
			Scenario { name: "pause".into(), config: ScenarioConfig::from(&super::super::pause::PauseCfg { value: String::new() }) },
			Scenario { name: "pause".into(), config: ScenarioConfig::from(&super::super::pause::PauseCfg { value: String::new() }) },
		];
		let cfg = ScenarioConfig::from(&ParallelCfg { skip_errors: false, steps });
		let res = runner.run(Context::new(CancellationToken::new()), &cfg).await;
		assert!(res.is_ok());
	}

	#[tokio::test]
	async fn one_failure_fails_whole_run_without_skip_errors() {
		let registry = registry();
		let exec = ParallelExecutor::new(registry);
		let runner = exec.new_runner("root");
		let steps = vec![
			Scenario { name: "pause".into(), config: ScenarioConfig::from(&super::super::pause::PauseCfg { value: String::new() }) },
			Scenario { name: "error".into(), config: ScenarioConfig::from(&super::super::error_step::ErrorCfg { error: "boom".into() }) },
		];
		let cfg = ScenarioConfig::from(&ParallelCfg { skip_errors: false, steps });
		let res = runner.run(Context::new(CancellationToken::new()), &cfg).await;
		assert!(!res.is_ok());
	}

	#[tokio::test]
	async fn failure_absorbed_with_skip_errors() {
		let registry = registry();
		let exec = ParallelExecutor::new(registry);
		let runner = exec.new_runner("root");
		let steps = vec![Scenario { name: "error".into(), config: ScenarioConfig::from(&super::super::error_step::ErrorCfg { error: "boom".into() }) }];
		let cfg = ScenarioConfig::from(&ParallelCfg { skip_errors: true, steps });
		let res = runner.run(Context::new(CancellationToken::new()), &cfg).await;
		assert!(res.is_ok());
		assert_eq!(res.ctx.skipped_errors().len(), 1);
	}

	/// Two branches each absorbing a failure via their own skipErrors
	/// sequence: the merged result must carry both, not just the
	/// last-completed branch's.
	#[tokio::test]
	async fn skipped_errors_from_every_branch_survive_the_merge() {
		let registry = Registry::new();
		registry.register(Arc::new(ErrorExecutor::new())).unwrap();
		registry.register(Arc::new(super::super::SequenceExecutor::new(registry.clone()))).unwrap();

		let branch = |msg: &str| Scenario {
			name: "sequence".into(),
			config: ScenarioConfig::from(&super::super::sequence::SequenceCfg {
				skip_errors: true,
				steps: vec![Scenario { name: "error".into(), config: ScenarioConfig::from(&super::super::error_step::ErrorCfg { error: msg.into() }) }],
				..Default::default()
			}),
		};

		let exec = ParallelExecutor::new(registry);
		let runner = exec.new_runner("root");
		let cfg = ScenarioConfig::from(&ParallelCfg { skip_errors: true, steps: vec![branch("first"), branch("second")] });
		let res = runner.run(Context::new(CancellationToken::new()), &cfg).await;

		assert!(res.is_ok());
		assert_eq!(res.ctx.skipped_errors().len(), 2, "both branches' absorbed errors should be present");
	}

	fn new_parallel_runner(registry: Arc<Registry>) -> Arc<ParallelRunner> {
		Arc::new(ParallelRunner {
			registry,
			name: "root/parallel-0".to_string(),
			step_count: AtomicUsize::new(0),
			joins: Mutex::new(JoinSet::new()),
			closed: AtomicBool::new(false),
		})
	}

	/// A branch attached mid-flight via `add_scenario` contributes to the
	/// overall parallel's merged context exactly like an initial branch,
	/// and its own oneshot receiver resolves independently.
	#[tokio::test]
	async fn add_scenario_joins_a_still_running_parallel() {
		let steps = vec![Scenario {
			name: "pause".into(),
			config: ScenarioConfig::from(&super::super::pause::PauseCfg { value: "20ms".into() }),
		}];
		let cfg = ScenarioConfig::from(&ParallelCfg { skip_errors: false, steps });

		let ctx = Context::new(CancellationToken::new());
		let parallel_runner = new_parallel_runner(registry());

		let added_ctx = ctx.clone();
		let added_step = Scenario { name: "pause".into(), config: ScenarioConfig::from(&super::super::pause::PauseCfg { value: String::new() }) };
		let added = parallel_runner.add_scenario(added_ctx, added_step).expect("parallel should still be open");

		let res = parallel_runner.run(ctx, &cfg).await;
		assert!(res.is_ok());
		let added_result = added.await.expect("added branch should report a result before the barrier closes");
		assert!(added_result.error.is_none());
	}

	#[tokio::test]
	async fn add_scenario_is_refused_once_the_barrier_has_closed() {
		let steps = vec![Scenario { name: "pause".into(), config: ScenarioConfig::from(&super::super::pause::PauseCfg { value: String::new() }) }];
		let cfg = ScenarioConfig::from(&ParallelCfg { skip_errors: false, steps });

		let ctx = Context::new(CancellationToken::new());
		let parallel_runner = new_parallel_runner(registry());

		let res = parallel_runner.run(ctx.clone(), &cfg).await;
		assert!(res.is_ok());

		let late_step = Scenario { name: "pause".into(), config: ScenarioConfig::from(&super::super::pause::PauseCfg { value: String::new() }) };
		let err = parallel_runner.add_scenario(ctx, late_step).expect_err("barrier has already closed");
		assert!(matches!(err, PerfTestError::Closed));
	}
}
