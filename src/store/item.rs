use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One stored entry. Serialized with the field names used on the wire and in
/// backup files (`Key`, `Value`, `Expiration`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
    pub key: String,
    pub value: String,
    /// Absolute expiry as seconds since UNIX epoch.
    pub expiration: i64,
}

impl Item {
    pub fn new(key: impl Into<String>, value: impl Into<String>, expiration: i64) -> Self {
        Item {
            key: key.into(),
            value: value.into(),
            expiration,
        }
    }

    /// Check if this item is dead at `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiration <= now
    }
}

/// Get current time in seconds since UNIX epoch.
pub fn now_seconds() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// Absolute expiration `ttl` seconds from now, saturating at the `i64` bounds.
pub fn expires_in(ttl: i64) -> i64 {
    now_seconds().saturating_add(ttl)
}
