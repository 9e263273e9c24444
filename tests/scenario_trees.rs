use solaris_perftests::config::{Scenario, ScenarioConfig};
use solaris_perftests::context::{Context, PAUSE_RUNNERS_COUNTER_KEY};
use solaris_perftests::runner::error_step::ErrorCfg;
use solaris_perftests::runner::parallel::ParallelCfg;
use solaris_perftests::runner::pause::PauseCfg;
use solaris_perftests::runner::repeat::RepeatCfg;
use solaris_perftests::runner::sequence::SequenceCfg;
use solaris_perftests::runner::{error_step, parallel, pause, repeat, sequence};
use solaris_perftests::wiring::build_registry;
use tokio_util::sync::CancellationToken;

fn pause_step() -> Scenario {
	Scenario { name: pause::NAME.to_string(), config: ScenarioConfig::from(&PauseCfg { value: "0s".to_string() }) }
}

/// Mirrors the "context propagation with errors" scenario tree: a
/// skip-errors sequence containing a skip-errors parallel, each branch of
/// which is itself a skip-errors sequence of pauses with one error step
/// sandwiched in the middle. Every branch should run to completion and the
/// overall test should still report success, with the error folded into
/// `skippedErrors` instead of aborting the tree.
fn context_propagation_with_errors_tree() -> Scenario {
	let branch_a = Scenario {
		name: sequence::NAME.to_string(),
		config: ScenarioConfig::from(&SequenceCfg {
			skip_errors: true,
			steps: vec![
				pause_step(),
				Scenario { name: error_step::NAME.to_string(), config: ScenarioConfig::from(&ErrorCfg { error: "Hello from error test".to_string() }) },
				pause_step(),
				pause_step(),
			],
			..Default::default()
		}),
	};
	let branch_b = Scenario {
		name: sequence::NAME.to_string(),
		config: ScenarioConfig::from(&SequenceCfg { skip_errors: true, steps: vec![pause_step(), pause_step(), pause_step(), pause_step()], ..Default::default() }),
	};

	Scenario {
		name: sequence::NAME.to_string(),
		config: ScenarioConfig::from(&SequenceCfg {
			skip_errors: true,
			steps: vec![Scenario {
				name: parallel::NAME.to_string(),
				config: ScenarioConfig::from(&ParallelCfg { skip_errors: true, steps: vec![branch_a, branch_b] }),
			}],
			..Default::default()
		}),
	}
}

#[tokio::test]
async fn context_propagation_with_errors_completes_and_records_the_skipped_error() {
	let registry = build_registry().unwrap();
	let scenario = context_propagation_with_errors_tree();
	let executor = registry.get(&scenario.name).unwrap();
	let runner = executor.new_runner("");

	let ctx = Context::new(CancellationToken::new());
	let result = runner.run(ctx, &scenario.config).await;

	assert!(result.is_ok(), "top-level skipErrors sequence should not itself fail");
	let skipped = result.ctx.skipped_errors();
	assert_eq!(skipped.len(), 1, "the single error step's failure should have been folded into skippedErrors");
}

/// Mirrors the "errors" scenario tree: a repeat of 10 parallel copies of an
/// always-failing error step, with skipErrors set on the repeat so the whole
/// tree completes despite every iteration failing.
#[tokio::test]
async fn repeated_errors_are_all_skipped() {
	let registry = build_registry().unwrap();
	let scenario = Scenario {
		name: sequence::NAME.to_string(),
		config: ScenarioConfig::from(&SequenceCfg {
			steps: vec![Scenario {
				name: parallel::NAME.to_string(),
				config: ScenarioConfig::from(&ParallelCfg {
					skip_errors: false,
					steps: vec![Scenario {
						name: sequence::NAME.to_string(),
						config: ScenarioConfig::from(&SequenceCfg {
							steps: vec![Scenario {
								name: repeat::NAME.to_string(),
								config: ScenarioConfig::from(&RepeatCfg {
									executor: parallel::NAME.to_string(),
									count: 10,
									skip_errors: true,
									period: String::new(),
									action: Scenario {
										name: error_step::NAME.to_string(),
										config: ScenarioConfig::from(&ErrorCfg { error: "Hello from error test".to_string() }),
									},
								}),
							}],
							..Default::default()
						}),
					}],
				}),
			}],
			..Default::default()
		}),
	};

	let executor = registry.get(&scenario.name).unwrap();
	let runner = executor.new_runner("");
	let ctx = Context::new(CancellationToken::new());
	let result = runner.run(ctx, &scenario.config).await;

	assert!(result.is_ok());
	assert_eq!(result.ctx.skipped_errors().len(), 10);
}

/// Mirrors the context-propagation fixture: a parallel with four branches
/// (two bare pauses, a sequential repeat of 10 pauses, a parallel repeat of
/// 10 pauses), followed by a bare pause, followed by a sequence wrapping a
/// sequential repeat of 10 more pauses. Every pause bumps `pauseRunnersCounter`
/// by one; since every branch's increment is relative to a shared base, the
/// final count should be the total number of pauses that ran (33), not just
/// the last branch folded in.
fn context_propagation_tree() -> Scenario {
	let repeat_of_pauses = |executor: &str, count: usize| Scenario {
		name: repeat::NAME.to_string(),
		config: ScenarioConfig::from(&RepeatCfg { executor: executor.to_string(), count, skip_errors: false, period: String::new(), action: pause_step() }),
	};

	Scenario {
		name: sequence::NAME.to_string(),
		config: ScenarioConfig::from(&SequenceCfg {
			steps: vec![
				Scenario {
					name: parallel::NAME.to_string(),
					config: ScenarioConfig::from(&ParallelCfg {
						skip_errors: false,
						steps: vec![pause_step(), pause_step(), repeat_of_pauses(sequence::NAME, 10), repeat_of_pauses(parallel::NAME, 10)],
					}),
				},
				pause_step(),
				Scenario {
					name: sequence::NAME.to_string(),
					config: ScenarioConfig::from(&SequenceCfg { steps: vec![repeat_of_pauses(sequence::NAME, 10)], ..Default::default() }),
				},
			],
			..Default::default()
		}),
	}
}

#[tokio::test]
async fn context_propagation_counts_every_pause_across_every_branch() {
	let registry = build_registry().unwrap();
	let scenario = context_propagation_tree();
	let executor = registry.get(&scenario.name).unwrap();
	let runner = executor.new_runner("");

	let ctx = Context::new(CancellationToken::new());
	let result = runner.run(ctx, &scenario.config).await;

	assert!(result.is_ok());
	assert_eq!(result.ctx.get_int(PAUSE_RUNNERS_COUNTER_KEY), Some(33));
}

#[tokio::test]
async fn cancellation_short_circuits_a_running_tree() {
	let registry = build_registry().unwrap();
	let scenario = Scenario {
		name: sequence::NAME.to_string(),
		config: ScenarioConfig::from(&SequenceCfg { steps: vec![pause_step(), pause_step()], ..Default::default() }),
	};
	let executor = registry.get(&scenario.name).unwrap();
	let runner = executor.new_runner("");

	let cancel = CancellationToken::new();
	cancel.cancel();
	let ctx = Context::new(cancel);
	let result = runner.run(ctx, &scenario.config).await;

	assert!(!result.is_ok());
}
