//! Relevance filtering shared by the event listing and the digest scheduler

use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, str::FromStr};

use crate::models::{EventView, UserContext};

/// Named mode narrowing an event list to what matters to one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelevanceFilter {
    Suggested,
    #[serde(rename = "Hosted by Subscribed Clubs")]
    SubscribedClubs,
    Attending,
}

impl RelevanceFilter {
    /// Label used in storage and in the API
    pub fn as_str(self) -> &'static str {
        match self {
            RelevanceFilter::Suggested => "Suggested",
            RelevanceFilter::SubscribedClubs => "Hosted by Subscribed Clubs",
            RelevanceFilter::Attending => "Attending",
        }
    }

    /// Parse an optional filter parameter; empty means no filter
    pub fn parse_optional(raw: Option<&str>) -> Result<Option<Self>, String> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => value.parse().map(Some),
        }
    }
}

impl fmt::Display for RelevanceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelevanceFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "suggested" => Ok(RelevanceFilter::Suggested),
            "hosted by subscribed clubs" | "subscribed" => Ok(RelevanceFilter::SubscribedClubs),
            "attending" => Ok(RelevanceFilter::Attending),
            other => Err(format!("unknown relevance filter '{other}'")),
        }
    }
}

/// Whether one event survives the relevance filter for this requester
pub fn is_relevant(event: &EventView, filter: Option<RelevanceFilter>, viewer: &UserContext) -> bool {
    match filter {
        None => true,
        Some(RelevanceFilter::Attending) => event.is_rsvp_yes(),
        Some(RelevanceFilter::SubscribedClubs) => event.subscribed,
        Some(RelevanceFilter::Suggested) => {
            // A yes RSVP overrides a club block.
            if event.blocked && !event.is_rsvp_yes() {
                return false;
            }
            event.subscribed || event.is_rsvp_yes() || shares_tag(event, viewer)
        }
    }
}

/// Keep the events relevant to the requester, preserving order
pub fn apply_relevance_filter(
    events: Vec<EventView>,
    filter: Option<RelevanceFilter>,
    viewer: &UserContext,
) -> Vec<EventView> {
    if filter.is_none() {
        return events;
    }
    events
        .into_iter()
        .filter(|event| is_relevant(event, filter, viewer))
        .collect()
}

fn shares_tag(event: &EventView, viewer: &UserContext) -> bool {
    if viewer.tags.is_empty() || event.tags.is_empty() {
        return false;
    }
    let interests: HashSet<&str> = viewer.tags.iter().map(String::as_str).collect();
    event.tags.iter().any(|tag| interests.contains(tag.as_str()))
}
