//! Event visibility engine
//!
//! Given a date range, a requester and an optional relevance filter, the
//! engine returns the events the requester may see, each annotated with the
//! requester's RSVP and subscription state.

mod engine;
mod filter;
mod range;

pub use engine::{EventQuery, EventQueryError, list_events, passes_gender_gate};
pub use filter::{RelevanceFilter, apply_relevance_filter, is_relevant};
pub use range::DateRange;
