//! Unique test data built on ULIDs, so parallel tests never collide on
//! idempotency references.

use std::sync::atomic::{AtomicI64, Ordering};

use ulid::Ulid;

static NEXT_USER_ID: AtomicI64 = AtomicI64::new(10_000);

/// A unique string in the form `{prefix}-{ulid}`.
///
/// ```
/// use backend_test_support::unique_helpers::unique_str;
///
/// let a = unique_str("dep");
/// let b = unique_str("dep");
/// assert_ne!(a, b);
/// assert!(a.starts_with("dep-"));
/// ```
pub fn unique_str(prefix: &str) -> String {
    format!("{}-{}", prefix, Ulid::new())
}

/// A unique payout destination.
pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.test", prefix, Ulid::new())
}

/// A process-unique user id, above any id a test hard-codes.
pub fn unique_user_id() -> i64 {
    NEXT_USER_ID.fetch_add(1, Ordering::Relaxed)
}
