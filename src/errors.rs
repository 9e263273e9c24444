use thiserror::Error;

/// The closed set of error kinds the scenario engine itself can raise.
///
/// Anything crossing the engine's boundary (CLI glue, config loading, `main`)
/// widens to `anyhow::Result` instead of matching on this enum.
#[derive(Error, Debug)]
pub enum PerfTestError {
	#[error("run context is closed")]
	Closed,

	#[error("failed to parse scenario config: {0}")]
	ConfigParse(String),

	#[error("{0}")]
	NotExist(String),

	#[error("{0}")]
	Exist(String),

	#[error("{0}")]
	Invalid(String),

	#[error("internal error: {0}")]
	Internal(String),

	#[error("unsupported: {0}")]
	Unsupported(String),

	#[error(transparent)]
	Transport(#[from] tonic::Status),

	#[error(transparent)]
	Transparent(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PerfTestError>;
