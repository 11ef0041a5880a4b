//! A single place that knows what time it is.
//!
//! Every component that needs "now" for a timestamp column, a keepalive
//! comparison, or a token expiry goes through here rather than calling
//! `chrono::Utc::now()` directly, so tests can see the exact instant a
//! transition was stamped with.

use chrono::{DateTime, Utc};

/// The current time, timezone-aware (always UTC internally; Postgres
/// `timestamptz` columns normalize on write/read regardless).
#[must_use]
pub fn now_tz_aware() -> DateTime<Utc> {
    Utc::now()
}
