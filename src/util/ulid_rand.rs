use std::time::{Duration, SystemTime};

use rand::Rng;
use ulid::Ulid;

use crate::errors::{PerfTestError, Result};

/// Generates a ULID for a uniformly random instant between `from` and `to`,
/// used by `solaris.randQuery` to pick a starting record for a random page.
pub fn rand_ulid(from: SystemTime, to: SystemTime) -> Result<Ulid> {
	let span = to.duration_since(from).map_err(|e| PerfTestError::Invalid(format!("from must precede to: {e}")))?;
	if span.is_zero() {
		return Ok(Ulid::from_datetime(from));
	}
	let offset_millis = rand::thread_rng().gen_range(0..span.as_millis());
	let at = from + Duration::from_millis(offset_millis as u64);
	Ok(Ulid::from_datetime(at))
}

/// The largest ULID whose timestamp component is still representable —
/// used as the descending-query anchor to find the newest record.
pub fn max_ulid() -> Ulid {
	const MAX_TIMESTAMP_MS: u64 = (1 << 48) - 1;
	Ulid::from_parts(MAX_TIMESTAMP_MS, 0)
}
