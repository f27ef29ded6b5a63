//! In-memory store with the same semantics as the PostgreSQL queries

use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use common::error::DatabaseError;

use super::{
    CandidateQuery, EventStore, MembershipStore, ReportStore, SessionStore, UserStore,
};
use crate::{
    error::{StoreError, StoreResult},
    models::{EmailFrequency, EventView, Gender, HostClub, RsvpState, Session, SubscriptionState, User},
    preferences::PreferenceUpdate,
    reports::{ReportKind, ReportRow},
    session::generate_token,
};

/// Event fields supplied when seeding the store
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub school_id: i64,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub gender_restriction: Option<Gender>,
    pub is_approved: bool,
    pub tags: Vec<String>,
}

impl NewEvent {
    /// An approved, unrestricted one-hour event
    pub fn new(school_id: i64, name: &str, start_time: DateTime<Utc>) -> Self {
        Self {
            school_id,
            name: name.to_string(),
            start_time,
            end_time: start_time + chrono::TimeDelta::hours(1),
            gender_restriction: None,
            is_approved: true,
            tags: Vec::new(),
        }
    }

    pub fn restricted_to(mut self, gender: Gender) -> Self {
        self.gender_restriction = Some(gender);
        self
    }

    pub fn pending(mut self) -> Self {
        self.is_approved = false;
        self
    }

    pub fn tagged(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

struct ClubRow {
    school_id: i64,
    name: String,
    is_active: bool,
}

struct EventRow {
    event: NewEvent,
    is_active: bool,
    is_approved: bool,
}

struct HostRow {
    event_id: i64,
    club_id: i64,
    is_approved: bool,
    is_active: bool,
}

/// A soft-state relationship row
#[derive(Clone, Copy)]
struct Flagged<T> {
    is_active: bool,
    value: T,
}

type UserKey = (String, i64);

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: HashMap<UserKey, User>,
    sessions: HashMap<String, Session>,
    user_tags: HashMap<UserKey, Vec<String>>,
    clubs: BTreeMap<i64, ClubRow>,
    club_admins: HashMap<(i64, UserKey), bool>,
    events: BTreeMap<i64, EventRow>,
    hosts: Vec<HostRow>,
    subscriptions: HashMap<(UserKey, i64), Flagged<SubscriptionState>>,
    rsvps: HashMap<(UserKey, i64), Flagged<RsvpState>>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

fn key(email: &str, school_id: i64) -> UserKey {
    (email.to_string(), school_id)
}

/// Store keeping every table behind one mutex
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail as if the database were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database(DatabaseError::Connection(
                sqlx::Error::PoolTimedOut,
            )));
        }
        Ok(self.tables.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn seed(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_user(&self, user: User) {
        self.seed()
            .users
            .insert(key(&user.email, user.school_id), user);
    }

    /// Replace a stored user in place
    pub fn update_user(&self, email: &str, school_id: i64, update: impl FnOnce(&mut User)) {
        if let Some(user) = self.seed().users.get_mut(&key(email, school_id)) {
            update(user);
        }
    }

    pub fn set_user_tags(&self, email: &str, school_id: i64, tags: &[&str]) {
        self.seed().user_tags.insert(
            key(email, school_id),
            tags.iter().map(|t| t.to_string()).collect(),
        );
    }

    pub fn add_club(&self, school_id: i64, name: &str) -> i64 {
        let mut tables = self.seed();
        let id = tables.next_id();
        tables.clubs.insert(
            id,
            ClubRow {
                school_id,
                name: name.to_string(),
                is_active: true,
            },
        );
        id
    }

    pub fn deactivate_club(&self, club_id: i64) {
        if let Some(club) = self.seed().clubs.get_mut(&club_id) {
            club.is_active = false;
        }
    }

    pub fn add_club_admin(&self, club_id: i64, email: &str, school_id: i64) {
        self.seed()
            .club_admins
            .insert((club_id, key(email, school_id)), true);
    }

    pub fn add_event(&self, event: NewEvent) -> i64 {
        let mut tables = self.seed();
        let id = tables.next_id();
        let is_approved = event.is_approved;
        tables.events.insert(
            id,
            EventRow {
                event,
                is_active: true,
                is_approved,
            },
        );
        id
    }

    pub fn deactivate_event(&self, event_id: i64) {
        if let Some(event) = self.seed().events.get_mut(&event_id) {
            event.is_active = false;
        }
    }

    /// Attach a club as host of an event
    pub fn add_host(&self, event_id: i64, club_id: i64, is_approved: bool) {
        self.seed().hosts.push(HostRow {
            event_id,
            club_id,
            is_approved,
            is_active: true,
        });
    }

    pub fn session_count(&self) -> usize {
        self.seed().sessions.len()
    }
}

fn event_view(tables: &Tables, id: i64, row: &EventRow, user: &UserKey) -> EventView {
    let host_ids: Vec<i64> = tables
        .hosts
        .iter()
        .filter(|h| h.event_id == id && h.is_active && h.is_approved)
        .map(|h| h.club_id)
        .collect();

    let mut hosts: Vec<HostClub> = host_ids
        .iter()
        .filter_map(|club_id| {
            tables.clubs.get(club_id).map(|club| HostClub {
                id: *club_id,
                name: club.name.clone(),
            })
        })
        .collect();
    hosts.sort_by(|a, b| a.name.cmp(&b.name));

    let mut tags = row.event.tags.clone();
    tags.sort();

    let rsvp = tables
        .rsvps
        .get(&(user.clone(), id))
        .filter(|r| r.is_active)
        .map(|r| r.value);

    let mut view = EventView {
        id,
        school_id: row.event.school_id,
        name: row.event.name.clone(),
        start_time: row.event.start_time,
        end_time: row.event.end_time,
        location: String::new(),
        cost: String::new(),
        description: String::new(),
        gender_restriction: row.event.gender_restriction,
        is_approved: row.is_approved,
        hosts,
        tags,
        rsvp,
        subscribed: false,
        blocked: false,
    };
    view.set_subscription(host_ids.iter().filter_map(|club_id| {
        tables
            .subscriptions
            .get(&(user.clone(), *club_id))
            .filter(|s| s.is_active)
            .map(|s| s.value)
    }));
    view
}

impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        email: &str,
        school_id: i64,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let session = Session {
            token: generate_token(),
            user_email: email.to_string(),
            school_id,
            created_at: Utc::now(),
            expires_at,
        };
        self.tables()?
            .sessions
            .insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn find_session(&self, token: &str) -> StoreResult<Option<Session>> {
        Ok(self.tables()?.sessions.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> StoreResult<bool> {
        Ok(self.tables()?.sessions.remove(token).is_some())
    }
}

impl UserStore for MemoryStore {
    async fn find_active_user(&self, email: &str, school_id: i64) -> StoreResult<Option<User>> {
        Ok(self
            .tables()?
            .users
            .get(&key(email, school_id))
            .filter(|u| u.is_active)
            .cloned())
    }

    async fn admin_club_ids(&self, email: &str, school_id: i64) -> StoreResult<Vec<i64>> {
        let tables = self.tables()?;
        let user = key(email, school_id);
        let mut ids: Vec<i64> = tables
            .club_admins
            .iter()
            .filter(|((club_id, admin), active)| {
                **active
                    && *admin == user
                    && tables.clubs.get(club_id).is_some_and(|c| c.is_active)
            })
            .map(|((club_id, _), _)| *club_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn interest_tags(&self, email: &str, school_id: i64) -> StoreResult<Vec<String>> {
        let mut tags = self
            .tables()?
            .user_tags
            .get(&key(email, school_id))
            .cloned()
            .unwrap_or_default();
        tags.sort();
        Ok(tags)
    }

    async fn digest_recipients(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self
            .tables()?
            .users
            .values()
            .filter(|u| u.is_active && !u.is_banned && u.email_frequency != EmailFrequency::Never)
            .cloned()
            .collect();
        users.sort_by(|a, b| (a.school_id, &a.email).cmp(&(b.school_id, &b.email)));
        Ok(users)
    }

    async fn update_preference(
        &self,
        email: &str,
        school_id: i64,
        update: &PreferenceUpdate,
    ) -> StoreResult<()> {
        let mut tables = self.tables()?;
        let user = tables
            .users
            .get_mut(&key(email, school_id))
            .ok_or_else(|| StoreError::NotFound(format!("user {email}")))?;

        match *update {
            PreferenceUpdate::EmailFrequency(frequency) => user.email_frequency = frequency,
            PreferenceUpdate::EmailEventType(filter) => user.email_event_type = filter,
            PreferenceUpdate::Gender(gender) => user.gender = gender,
        }
        Ok(())
    }
}

impl EventStore for MemoryStore {
    async fn candidate_events(&self, query: &CandidateQuery<'_>) -> StoreResult<Vec<EventView>> {
        let tables = self.tables()?;
        let user = key(query.user_email, query.school_id);

        Ok(tables
            .events
            .iter()
            .filter(|(_, row)| {
                row.is_active
                    && row.event.school_id == query.school_id
                    && query.range.contains(row.event.start_time)
                    && row.is_approved == query.approved
            })
            .map(|(id, row)| event_view(&tables, *id, row, &user))
            .collect())
    }

    async fn approve_event(&self, school_id: i64, event_id: i64) -> StoreResult<bool> {
        let mut tables = self.tables()?;
        match tables.events.get_mut(&event_id) {
            Some(row) if row.is_active && row.event.school_id == school_id => {
                row.is_approved = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn approve_host(&self, school_id: i64, event_id: i64, club_id: i64) -> StoreResult<bool> {
        let mut tables = self.tables()?;
        let in_school = tables
            .events
            .get(&event_id)
            .is_some_and(|row| row.event.school_id == school_id);
        if !in_school {
            return Ok(false);
        }

        let mut approved = false;
        for host in tables
            .hosts
            .iter_mut()
            .filter(|h| h.event_id == event_id && h.club_id == club_id && h.is_active)
        {
            host.is_approved = true;
            approved = true;
        }
        Ok(approved)
    }
}

impl MembershipStore for MemoryStore {
    async fn set_subscription(
        &self,
        email: &str,
        school_id: i64,
        club_id: i64,
        state: Option<SubscriptionState>,
    ) -> StoreResult<()> {
        let mut tables = self.tables()?;
        let exists = tables
            .clubs
            .get(&club_id)
            .is_some_and(|c| c.is_active && c.school_id == school_id);
        if !exists {
            return Err(StoreError::NotFound(format!("club {club_id}")));
        }

        let row_key = (key(email, school_id), club_id);
        match state {
            Some(value) => {
                tables.subscriptions.insert(
                    row_key,
                    Flagged {
                        is_active: true,
                        value,
                    },
                );
            }
            None => {
                if let Some(row) = tables.subscriptions.get_mut(&row_key) {
                    row.is_active = false;
                }
            }
        }
        Ok(())
    }

    async fn set_rsvp(
        &self,
        email: &str,
        school_id: i64,
        event_id: i64,
        state: Option<RsvpState>,
    ) -> StoreResult<()> {
        let mut tables = self.tables()?;
        let exists = tables
            .events
            .get(&event_id)
            .is_some_and(|e| e.is_active && e.event.school_id == school_id);
        if !exists {
            return Err(StoreError::NotFound(format!("event {event_id}")));
        }

        let row_key = (key(email, school_id), event_id);
        match state {
            Some(value) => {
                tables.rsvps.insert(
                    row_key,
                    Flagged {
                        is_active: true,
                        value,
                    },
                );
            }
            None => {
                if let Some(row) = tables.rsvps.get_mut(&row_key) {
                    row.is_active = false;
                }
            }
        }
        Ok(())
    }

    async fn subscriptions(
        &self,
        email: &str,
        school_id: i64,
    ) -> StoreResult<Vec<(i64, SubscriptionState)>> {
        let tables = self.tables()?;
        let user = key(email, school_id);
        let mut rows: Vec<(i64, SubscriptionState)> = tables
            .subscriptions
            .iter()
            .filter(|((owner, _), row)| *owner == user && row.is_active)
            .map(|((_, club_id), row)| (*club_id, row.value))
            .collect();
        rows.sort_by_key(|(club_id, _)| *club_id);
        Ok(rows)
    }
}

impl ReportStore for MemoryStore {
    async fn run_report(&self, school_id: i64, kind: ReportKind) -> StoreResult<Vec<ReportRow>> {
        let tables = self.tables()?;
        let mut rows: Vec<ReportRow> = match kind {
            ReportKind::ClubSubscribers => tables
                .clubs
                .iter()
                .filter(|(_, c)| c.school_id == school_id && c.is_active)
                .map(|(id, c)| ReportRow {
                    label: c.name.clone(),
                    value: tables
                        .subscriptions
                        .iter()
                        .filter(|((_, club_id), s)| {
                            club_id == id
                                && s.is_active
                                && s.value == SubscriptionState::Subscribed
                        })
                        .count() as i64,
                })
                .collect(),
            ReportKind::EventAttendance => tables
                .events
                .iter()
                .filter(|(_, e)| e.event.school_id == school_id && e.is_active && e.is_approved)
                .map(|(id, e)| ReportRow {
                    label: e.event.name.clone(),
                    value: tables
                        .rsvps
                        .iter()
                        .filter(|((_, event_id), r)| {
                            event_id == id && r.is_active && r.value.is_yes()
                        })
                        .count() as i64,
                })
                .collect(),
            ReportKind::DigestFrequency => {
                let mut counts: BTreeMap<&'static str, i64> = BTreeMap::new();
                for user in tables
                    .users
                    .values()
                    .filter(|u| u.school_id == school_id && u.is_active && !u.is_banned)
                {
                    *counts.entry(user.email_frequency.as_str()).or_default() += 1;
                }
                counts
                    .into_iter()
                    .map(|(label, value)| ReportRow {
                        label: label.to_string(),
                        value,
                    })
                    .collect()
            }
        };

        if kind != ReportKind::DigestFrequency {
            rows.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.label.cmp(&b.label)));
        }
        Ok(rows)
    }
}
