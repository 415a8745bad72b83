/// Separator between category names in the `categories` column
pub const CATEGORY_DELIMITER: char = ';';

/// Database file used when `--db` is not given
pub const DEFAULT_DB_PATH: &str = "wikietl.db";

/// How long a write waits on a lock held by another run before failing
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Progress update interval (refresh the bar every N rows)
pub const PROGRESS_INTERVAL: u64 = 100;

/// Rows returned by `wikietl stats --top`
pub const DEFAULT_TOP_VIEWED: u32 = 10;
