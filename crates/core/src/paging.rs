//! Limit clamping for list queries.

/// Default number of rows returned by a trash listing.
pub const DEFAULT_TRASH_LIMIT: i64 = 50;

/// Upper bound on rows returned by a trash listing.
pub const MAX_TRASH_LIMIT: i64 = 500;

/// Clamp a caller-provided limit to `[1, max]`, falling back to `default`.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a trash listing limit.
pub fn clamp_trash_limit(limit: Option<i64>) -> i64 {
    clamp_limit(limit, DEFAULT_TRASH_LIMIT, MAX_TRASH_LIMIT)
}
