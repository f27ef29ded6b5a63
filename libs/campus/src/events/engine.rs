//! Event listing for one requester

use thiserror::Error;
use tracing::debug;

use super::{DateRange, RelevanceFilter, apply_relevance_filter};
use crate::{
    error::StoreError,
    models::{EventView, UserContext},
    store::{CandidateQuery, EventStore},
};

/// Errors returned by [`list_events`]
#[derive(Error, Debug)]
pub enum EventQueryError {
    /// A date bound could not be parsed
    #[error("Invalid date: {0}")]
    DateFormat(String),

    /// The range ends before it starts
    #[error("Invalid date range: end is before start")]
    InvalidRange,

    /// The relevance filter name is not known
    #[error("Invalid filter: {0}")]
    UnknownFilter(String),

    /// The store failed
    #[error("Event lookup failed: {0}")]
    Store(#[from] StoreError),
}

/// Parameters of one visibility query
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    pub range: DateRange,
    pub filter: Option<RelevanceFilter>,
    /// Exact match on `is_approved`. Callers must check faculty status
    /// before passing `false`.
    pub approved_only: bool,
}

impl EventQuery {
    /// Validate raw request parameters into a query
    pub fn parse(
        start: &str,
        end: &str,
        filter: Option<&str>,
        approved_only: bool,
    ) -> Result<Self, EventQueryError> {
        let range = DateRange::parse(start, end)?;
        let filter =
            RelevanceFilter::parse_optional(filter).map_err(EventQueryError::UnknownFilter)?;
        Ok(Self {
            range,
            filter,
            approved_only,
        })
    }
}

/// Gender gate: unrestricted events are open to everyone, restricted ones
/// only to matching users. Faculty bypass the gate. A user without a gender
/// on record never passes a restriction.
pub fn passes_gender_gate(event: &EventView, viewer: &UserContext) -> bool {
    match event.gender_restriction {
        None => true,
        Some(_) if viewer.is_faculty => true,
        Some(restriction) => viewer.gender == Some(restriction),
    }
}

/// List the events `requester` may see for `query`, sorted by start time.
///
/// The store narrows by school, activity, date range and approval; the
/// gender gate and relevance filter are applied here so the live listing and
/// the digest scheduler share one implementation.
pub async fn list_events<S: EventStore>(
    store: &S,
    requester: &UserContext,
    query: &EventQuery,
) -> Result<Vec<EventView>, EventQueryError> {
    let candidates = store
        .candidate_events(&CandidateQuery {
            school_id: requester.school_id,
            user_email: &requester.email,
            range: query.range,
            approved: query.approved_only,
        })
        .await?;
    let total = candidates.len();

    let visible: Vec<EventView> = candidates
        .into_iter()
        .filter(|event| passes_gender_gate(event, requester))
        .collect();

    let mut events = apply_relevance_filter(visible, query.filter, requester);
    events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));

    debug!(
        user = %requester.email,
        candidates = total,
        returned = events.len(),
        filter = ?query.filter,
        "Listed events"
    );

    Ok(events)
}
