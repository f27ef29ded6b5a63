//! Request-scoped session context
//!
//! The transport layer carries this value between requests (the services
//! keep it in a signed cookie) and hands it to the validator on every
//! request.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub token: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub logged_out: bool,
}

impl SessionContext {
    /// Context for a session that was just created
    pub fn started(token: String, now: DateTime<Utc>) -> Self {
        Self {
            token: Some(token),
            last_activity: Some(now),
            logged_out: false,
        }
    }

    /// Context left behind by an explicit logout
    pub fn logged_out() -> Self {
        Self {
            token: None,
            last_activity: None,
            logged_out: true,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
    }

    /// Idle when there is no recorded activity or the gap reached the timeout
    pub fn is_idle(&self, now: DateTime<Utc>, timeout: TimeDelta) -> bool {
        match self.last_activity {
            Some(last) => now - last >= timeout,
            None => true,
        }
    }

    /// Serialize for the transport carrier
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Anything that does not decode yields an empty context
    pub fn decode(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }
}
