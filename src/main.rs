use clap::Parser;
use solaris_perftests::{cli, testrunner::TestRunner, wiring};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;

fn main() -> anyhow::Result<()> {
	let cli = cli::Cli::parse();

	match cli.command {
		cli::Command::Start { configs } => {
			let cfg = cli::load_start_config(&configs)?;
			init_logging(&cfg.log.level)?;
			tracing::info!(config = %cfg, "loaded config");

			let rt = tokio::runtime::Runtime::new()?;
			rt.block_on(run_start(cfg))
		},
		cli::Command::DefaultCfg { path } => cli::default_cfg(&path),
		cli::Command::GenerateCfg { path, op, params } => cli::generate_cfg(&path, &op, &params),
		cli::Command::Version => {
			cli::print_version();
			Ok(())
		},
	}
}

async fn run_start(cfg: solaris_perftests::config::Config) -> anyhow::Result<()> {
	let registry = wiring::build_registry()?;
	let cancel = CancellationToken::new();

	let signal_cancel = cancel.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::info!("interrupt received, cancelling running tests");
			signal_cancel.cancel();
		}
	});

	let runner = TestRunner::new(registry, cancel);
	runner.run(&cfg).await
}

const EXEC_LOG_TARGET: &str = "exec";

/// Three-sink layered subscriber: a pretty stdout layer at `INFO` and above
/// (or the level named by the config, with `RUST_LOG` still able to
/// override), a plain-text file layer catching `WARN` and above, and a
/// JSON file layer carrying only events whose target starts with `exec` —
/// the per-test pass/fail and per-metric-fix summary records, kept apart
/// from human-facing diagnostics so downstream tooling can parse them.
fn init_logging(level: &str) -> anyhow::Result<()> {
	use std::fs::File;
	use std::sync::Arc;
	use tracing_subscriber::filter;

	let stdout_level = if level.is_empty() {
		tracing_subscriber::EnvFilter::new("info")
	} else {
		tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
	};

	let stdout_log = tracing_subscriber::fmt::layer().pretty();

	let log_file = File::create("perftests.log")?;
	let file_log = tracing_subscriber::fmt::layer().with_writer(Arc::new(log_file));

	let exec_file = File::create("perftests.exec.log")?;
	let exec_log = tracing_subscriber::fmt::layer().json().with_writer(Arc::new(exec_file));

	tracing_subscriber::registry()
		.with(
			stdout_log
				.with_filter(stdout_level)
				.and_then(file_log.with_filter(filter::LevelFilter::WARN))
				.with_filter(filter::filter_fn(|metadata| !metadata.target().starts_with(EXEC_LOG_TARGET))),
		)
		.with(exec_log.with_filter(filter::filter_fn(|metadata| metadata.target().starts_with(EXEC_LOG_TARGET))))
		.init();
	Ok(())
}
