//! Persisted session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the session mapping: an opaque token bound to a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub token: String,
    pub user_email: String,
    pub school_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the absolute lifetime of the session has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
