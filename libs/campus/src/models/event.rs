//! Event view model returned by the visibility engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::Gender;

/// A club with an approved host relation to an event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostClub {
    pub id: i64,
    pub name: String,
}

/// The requester's active RSVP row for an event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RsvpState {
    /// `is_yes = true`
    Rsvp,
    /// `is_yes = false`
    Block,
}

impl RsvpState {
    pub fn from_is_yes(is_yes: bool) -> Self {
        if is_yes { RsvpState::Rsvp } else { RsvpState::Block }
    }

    pub fn is_yes(self) -> bool {
        matches!(self, RsvpState::Rsvp)
    }
}

/// The requester's active subscription row for a club
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    /// `subscribed_or_blocked = 0`
    Blocked,
    /// `subscribed_or_blocked = 1`
    Subscribed,
}

impl SubscriptionState {
    pub fn from_flag(flag: i16) -> Option<Self> {
        match flag {
            0 => Some(SubscriptionState::Blocked),
            1 => Some(SubscriptionState::Subscribed),
            _ => None,
        }
    }

    pub fn flag(self) -> i16 {
        match self {
            SubscriptionState::Blocked => 0,
            SubscriptionState::Subscribed => 1,
        }
    }
}

/// An event annotated with the requester's relationship to it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventView {
    pub id: i64,
    pub school_id: i64,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: String,
    pub cost: String,
    pub description: String,
    pub gender_restriction: Option<Gender>,
    pub is_approved: bool,
    pub hosts: Vec<HostClub>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsvp: Option<RsvpState>,
    pub subscribed: bool,
    pub blocked: bool,
}

impl EventView {
    /// Fold the requester's per-host subscription rows into the
    /// `subscribed`/`blocked` pair. Subscribed wins over blocked.
    pub fn set_subscription(&mut self, states: impl IntoIterator<Item = SubscriptionState>) {
        let best = states.into_iter().max_by_key(|s| s.flag());
        self.subscribed = best == Some(SubscriptionState::Subscribed);
        self.blocked = best == Some(SubscriptionState::Blocked);
    }

    pub fn is_rsvp_yes(&self) -> bool {
        self.rsvp.is_some_and(RsvpState::is_yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EventView {
        EventView {
            id: 1,
            school_id: 1,
            name: "Jam".to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            location: String::new(),
            cost: String::new(),
            description: String::new(),
            gender_restriction: None,
            is_approved: true,
            hosts: vec![],
            tags: vec![],
            rsvp: None,
            subscribed: false,
            blocked: false,
        }
    }

    #[test]
    fn test_subscription_precedence() {
        let mut event = sample();
        event.set_subscription([SubscriptionState::Blocked, SubscriptionState::Subscribed]);
        assert!(event.subscribed);
        assert!(!event.blocked);

        event.set_subscription([SubscriptionState::Blocked]);
        assert!(!event.subscribed);
        assert!(event.blocked);

        event.set_subscription([]);
        assert!(!event.subscribed);
        assert!(!event.blocked);
    }

    #[test]
    fn test_rsvp_serializes_lowercase() {
        let mut event = sample();
        event.rsvp = Some(RsvpState::Rsvp);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["rsvp"], "rsvp");
        assert!(event.is_rsvp_yes());

        event.rsvp = None;
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("rsvp").is_none());
    }
}
