//! Central configuration constants for runtime limits and defaults.

/// Default glob pattern: every file under the source root, recursively.
pub const DEFAULT_PATTERN: &str = "**/*";

/// Default number of concurrent upload workers (sequential baseline).
pub const DEFAULT_PARALLELISM: usize = 1;

/// Minimum allowed concurrent upload workers.
pub const MIN_PARALLELISM: usize = 1;

/// Maximum allowed concurrent upload workers.
pub const MAX_PARALLELISM: usize = 16;

/// Default whole-job retry budget.
pub const DEFAULT_RETRY_BUDGET: u32 = 5;

/// Default fixed delay between whole-job retries, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

/// Failures further apart than this restore the full retry budget, in seconds.
pub const DEFAULT_RETRY_RESET_SECS: u64 = 200;

/// Default storage service endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Bucket identifier environment variable.
pub const ENV_BUCKET: &str = "BUCKET";

/// Expected file count, used only to size the progress bar.
pub const ENV_KNOWN_TOTAL: &str = "KNOWN_TOTAL";

/// Storage service endpoint override.
pub const ENV_ENDPOINT: &str = "HOIST_ENDPOINT";

/// Optional bearer token for the storage service.
pub const ENV_TOKEN: &str = "HOIST_TOKEN";

/// Convenience function to clamp a parallelism value into allowed range.
pub fn clamp_parallelism(v: usize) -> usize {
    v.clamp(MIN_PARALLELISM, MAX_PARALLELISM)
}
