use std::time::Duration;

/// Maximum time to wait when acquiring an index's read or write lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Largest accepted request body; bulk loads are sent in chunks well below this.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Suggestions returned when the request does not name a limit.
pub const DEFAULT_SUGGEST_LIMIT: usize = 5;
