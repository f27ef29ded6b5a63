//! Store traits consumed by the core, and their implementations
//!
//! [`PgStore`] talks to PostgreSQL. [`MemoryStore`] keeps the same tables in
//! memory and is available to tests through the `testing` feature.

use chrono::{DateTime, Utc};
use std::future::Future;

use crate::{
    error::StoreResult,
    events::DateRange,
    models::{EventView, RsvpState, Session, SubscriptionState, User, UserContext},
    preferences::PreferenceUpdate,
    reports::{ReportKind, ReportRow},
};

#[cfg(any(test, feature = "testing"))]
mod memory;
mod postgres;

#[cfg(any(test, feature = "testing"))]
pub use memory::{MemoryStore, NewEvent};
pub use postgres::PgStore;

/// Coarse event selection pushed down to the store
#[derive(Debug, Clone, Copy)]
pub struct CandidateQuery<'a> {
    pub school_id: i64,
    /// Whose RSVP and subscription rows annotate the result
    pub user_email: &'a str,
    pub range: DateRange,
    /// Exact match on `is_approved`
    pub approved: bool,
}

/// Persisted session tokens
pub trait SessionStore: Send + Sync {
    /// Create a session with a fresh random token
    fn create_session(
        &self,
        email: &str,
        school_id: i64,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Session>> + Send;

    fn find_session(&self, token: &str) -> impl Future<Output = StoreResult<Option<Session>>> + Send;

    /// Returns whether a session was removed
    fn delete_session(&self, token: &str) -> impl Future<Output = StoreResult<bool>> + Send;
}

/// User records and their relationship sets
pub trait UserStore: Send + Sync {
    /// Look up a user with `is_active` set. Banned users are returned so the
    /// caller can tell the two apart.
    fn find_active_user(
        &self,
        email: &str,
        school_id: i64,
    ) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    /// Clubs the user actively administers, restricted to active clubs
    fn admin_club_ids(
        &self,
        email: &str,
        school_id: i64,
    ) -> impl Future<Output = StoreResult<Vec<i64>>> + Send;

    fn interest_tags(
        &self,
        email: &str,
        school_id: i64,
    ) -> impl Future<Output = StoreResult<Vec<String>>> + Send;

    /// Active, non-banned users whose email frequency is not `Never`
    fn digest_recipients(&self) -> impl Future<Output = StoreResult<Vec<User>>> + Send;

    fn update_preference(
        &self,
        email: &str,
        school_id: i64,
        update: &PreferenceUpdate,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Events and their moderation state
pub trait EventStore: Send + Sync {
    /// Active events of the school starting inside the range with the
    /// requested approval state, annotated for `user_email`.
    fn candidate_events(
        &self,
        query: &CandidateQuery<'_>,
    ) -> impl Future<Output = StoreResult<Vec<EventView>>> + Send;

    /// Returns whether an event was approved
    fn approve_event(
        &self,
        school_id: i64,
        event_id: i64,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Approve one club's host relation to an event
    fn approve_host(
        &self,
        school_id: i64,
        event_id: i64,
        club_id: i64,
    ) -> impl Future<Output = StoreResult<bool>> + Send;
}

/// Soft-state subscription and RSVP rows
pub trait MembershipStore: Send + Sync {
    /// Set or clear (`None`) the user's subscription to a club. Rows are
    /// reactivated rather than duplicated.
    fn set_subscription(
        &self,
        email: &str,
        school_id: i64,
        club_id: i64,
        state: Option<SubscriptionState>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Set or clear (`None`) the user's RSVP to an event
    fn set_rsvp(
        &self,
        email: &str,
        school_id: i64,
        event_id: i64,
        state: Option<RsvpState>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Active subscription rows of a user as `(club_id, state)`
    fn subscriptions(
        &self,
        email: &str,
        school_id: i64,
    ) -> impl Future<Output = StoreResult<Vec<(i64, SubscriptionState)>>> + Send;
}

/// Fixed faculty reports
pub trait ReportStore: Send + Sync {
    fn run_report(
        &self,
        school_id: i64,
        kind: ReportKind,
    ) -> impl Future<Output = StoreResult<Vec<ReportRow>>> + Send;
}

/// Everything a service needs from its store
pub trait Store:
    SessionStore + UserStore + EventStore + MembershipStore + ReportStore + Clone + 'static
{
}

impl<T> Store for T where
    T: SessionStore + UserStore + EventStore + MembershipStore + ReportStore + Clone + 'static
{
}

/// Build the context of a user from its row and relationship sets
pub async fn load_user_context<S: UserStore>(store: &S, user: &User) -> StoreResult<UserContext> {
    let club_admin_ids = store.admin_club_ids(&user.email, user.school_id).await?;
    let tags = store.interest_tags(&user.email, user.school_id).await?;
    Ok(UserContext::from_user(user, club_admin_ids, tags))
}
