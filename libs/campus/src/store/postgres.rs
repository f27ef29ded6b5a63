//! PostgreSQL store

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::{
    CandidateQuery, EventStore, MembershipStore, ReportStore, SessionStore, UserStore,
};
use crate::{
    error::{StoreError, StoreResult},
    models::{EventView, HostClub, RsvpState, Session, SubscriptionState, User},
    preferences::PreferenceUpdate,
    reports::{ReportKind, ReportRow},
    session::generate_token,
};

const USER_COLUMNS: &str = "email, school_id, first_name, last_name, is_active, is_banned, \
     is_faculty, can_delete_faculty, email_verified, email_frequency, email_event_type, gender";

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_club(&self, school_id: i64, club_id: i64) -> StoreResult<()> {
        let found = sqlx::query("SELECT 1 FROM clubs WHERE id = $1 AND school_id = $2 AND is_active")
            .bind(club_id)
            .bind(school_id)
            .fetch_optional(&self.pool)
            .await?;
        found
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("club {club_id}")))
    }

    async fn ensure_event(&self, school_id: i64, event_id: i64) -> StoreResult<()> {
        let found =
            sqlx::query("SELECT 1 FROM events WHERE id = $1 AND school_id = $2 AND is_active")
                .bind(event_id)
                .bind(school_id)
                .fetch_optional(&self.pool)
                .await?;
        found
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("event {event_id}")))
    }
}

fn invalid(column: &str, reason: String) -> StoreError {
    StoreError::InvalidValue(format!("{column}: {reason}"))
}

pub(crate) fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let frequency: String = row.try_get("email_frequency")?;
    let event_type: String = row.try_get("email_event_type")?;
    let gender: Option<String> = row.try_get("gender")?;

    Ok(User {
        email: row.try_get("email")?,
        school_id: row.try_get("school_id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        is_active: row.try_get("is_active")?,
        is_banned: row.try_get("is_banned")?,
        is_faculty: row.try_get("is_faculty")?,
        can_delete_faculty: row.try_get("can_delete_faculty")?,
        email_verified: row.try_get("email_verified")?,
        email_frequency: frequency
            .parse()
            .map_err(|e| invalid("email_frequency", e))?,
        email_event_type: event_type
            .parse()
            .map_err(|e| invalid("email_event_type", e))?,
        gender: gender
            .map(|g| g.parse())
            .transpose()
            .map_err(|e| invalid("gender", e))?,
    })
}

fn event_from_row(row: &PgRow) -> StoreResult<EventView> {
    let restriction: Option<String> = row.try_get("gender_restriction")?;
    let hosts: serde_json::Value = row.try_get("hosts")?;
    let hosts: Vec<HostClub> =
        serde_json::from_value(hosts).map_err(|e| invalid("hosts", e.to_string()))?;
    let rsvp_yes: Option<bool> = row.try_get("rsvp_yes")?;
    let subscription: Option<i16> = row.try_get("subscription")?;

    let mut event = EventView {
        id: row.try_get("id")?,
        school_id: row.try_get("school_id")?,
        name: row.try_get("name")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        location: row.try_get("location")?,
        cost: row.try_get("cost")?,
        description: row.try_get("description")?,
        gender_restriction: restriction
            .map(|g| g.parse())
            .transpose()
            .map_err(|e| invalid("gender_restriction", e))?,
        is_approved: row.try_get("is_approved")?,
        hosts,
        tags: row.try_get("tags")?,
        rsvp: rsvp_yes.map(RsvpState::from_is_yes),
        subscribed: false,
        blocked: false,
    };
    event.set_subscription(subscription.and_then(SubscriptionState::from_flag));
    Ok(event)
}

impl SessionStore for PgStore {
    async fn create_session(
        &self,
        email: &str,
        school_id: i64,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let token = generate_token();
        let row = sqlx::query(
            r#"
            INSERT INTO session_mapping (session_id, user_email, school_id, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING created_at
            "#,
        )
        .bind(&token)
        .bind(email)
        .bind(school_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(Session {
            token,
            user_email: email.to_string(),
            school_id,
            created_at: row.try_get("created_at")?,
            expires_at,
        })
    }

    async fn find_session(&self, token: &str) -> StoreResult<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, user_email, school_id, created_at, expires_at
            FROM session_mapping
            WHERE session_id = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Session {
                token: row.try_get("session_id")?,
                user_email: row.try_get("user_email")?,
                school_id: row.try_get("school_id")?,
                created_at: row.try_get("created_at")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
    }

    async fn delete_session(&self, token: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM session_mapping WHERE session_id = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl UserStore for PgStore {
    async fn find_active_user(&self, email: &str, school_id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND school_id = $2 AND is_active"
        ))
        .bind(email)
        .bind(school_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn admin_club_ids(&self, email: &str, school_id: i64) -> StoreResult<Vec<i64>> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT ca.club_id
            FROM club_admins ca
            JOIN clubs c ON c.id = ca.club_id
            WHERE ca.user_email = $1 AND ca.school_id = $2 AND ca.is_active AND c.is_active
            ORDER BY ca.club_id
            "#,
        )
        .bind(email)
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn interest_tags(&self, email: &str, school_id: i64) -> StoreResult<Vec<String>> {
        let tags = sqlx::query_scalar(
            r#"
            SELECT t.name
            FROM user_tags ut
            JOIN tags t ON t.id = ut.tag_id
            WHERE ut.user_email = $1 AND ut.school_id = $2 AND t.is_active
            ORDER BY t.name
            "#,
        )
        .bind(email)
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    async fn digest_recipients(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE is_active AND NOT is_banned AND email_frequency <> 'Never' \
             ORDER BY school_id, email"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn update_preference(
        &self,
        email: &str,
        school_id: i64,
        update: &PreferenceUpdate,
    ) -> StoreResult<()> {
        let result = sqlx::query(update.statement())
            .bind(update.bind_value())
            .bind(email)
            .bind(school_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {email}")));
        }
        Ok(())
    }
}

impl EventStore for PgStore {
    async fn candidate_events(&self, query: &CandidateQuery<'_>) -> StoreResult<Vec<EventView>> {
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.school_id, e.name, e.start_time, e.end_time, e.location, e.cost,
                   e.description, e.gender_restriction, e.is_approved,
                   COALESCE(
                       (SELECT json_agg(json_build_object('id', c.id, 'name', c.name) ORDER BY c.name)
                        FROM event_hosts h
                        JOIN clubs c ON c.id = h.club_id
                        WHERE h.event_id = e.id AND h.is_active AND h.is_approved),
                       '[]'::json) AS hosts,
                   COALESCE(
                       (SELECT array_agg(t.name ORDER BY t.name)
                        FROM event_tags et
                        JOIN tags t ON t.id = et.tag_id
                        WHERE et.event_id = e.id AND t.is_active),
                       ARRAY[]::text[]) AS tags,
                   (SELECT r.is_yes
                    FROM rsvps r
                    WHERE r.event_id = e.id AND r.user_email = $2 AND r.school_id = $1
                      AND r.is_active) AS rsvp_yes,
                   (SELECT MAX(s.subscribed_or_blocked)
                    FROM event_hosts h
                    JOIN subscriptions s ON s.club_id = h.club_id
                    WHERE h.event_id = e.id AND h.is_active AND h.is_approved
                      AND s.user_email = $2 AND s.school_id = $1 AND s.is_active) AS subscription
            FROM events e
            WHERE e.is_active
              AND e.school_id = $1
              AND e.start_time >= $3
              AND e.start_time < $4
              AND e.is_approved = $5
            ORDER BY e.start_time, e.id
            "#,
        )
        .bind(query.school_id)
        .bind(query.user_email)
        .bind(query.range.start)
        .bind(query.range.end)
        .bind(query.approved)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn approve_event(&self, school_id: i64, event_id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE events SET is_approved = TRUE WHERE id = $1 AND school_id = $2 AND is_active",
        )
        .bind(event_id)
        .bind(school_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn approve_host(&self, school_id: i64, event_id: i64, club_id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE event_hosts h
            SET is_approved = TRUE
            FROM events e
            WHERE h.event_id = e.id
              AND e.id = $1
              AND e.school_id = $2
              AND h.club_id = $3
              AND h.is_active
            "#,
        )
        .bind(event_id)
        .bind(school_id)
        .bind(club_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl MembershipStore for PgStore {
    async fn set_subscription(
        &self,
        email: &str,
        school_id: i64,
        club_id: i64,
        state: Option<SubscriptionState>,
    ) -> StoreResult<()> {
        self.ensure_club(school_id, club_id).await?;

        match state {
            Some(state) => {
                sqlx::query(
                    r#"
                    INSERT INTO subscriptions
                        (user_email, school_id, club_id, is_active, subscribed_or_blocked)
                    VALUES ($1, $2, $3, TRUE, $4)
                    ON CONFLICT (user_email, school_id, club_id) DO UPDATE SET
                        is_active = TRUE,
                        subscribed_or_blocked = EXCLUDED.subscribed_or_blocked,
                        updated_at = NOW()
                    "#,
                )
                .bind(email)
                .bind(school_id)
                .bind(club_id)
                .bind(state.flag())
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE subscriptions SET is_active = FALSE, updated_at = NOW()
                    WHERE user_email = $1 AND school_id = $2 AND club_id = $3
                    "#,
                )
                .bind(email)
                .bind(school_id)
                .bind(club_id)
                .execute(&self.pool)
                .await?;
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
        self.ensure_event(school_id, event_id).await?;

        match state {
            Some(state) => {
                sqlx::query(
                    r#"
                    INSERT INTO rsvps (user_email, school_id, event_id, is_active, is_yes)
                    VALUES ($1, $2, $3, TRUE, $4)
                    ON CONFLICT (user_email, school_id, event_id) DO UPDATE SET
                        is_active = TRUE,
                        is_yes = EXCLUDED.is_yes,
                        updated_at = NOW()
                    "#,
                )
                .bind(email)
                .bind(school_id)
                .bind(event_id)
                .bind(state.is_yes())
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE rsvps SET is_active = FALSE, updated_at = NOW()
                    WHERE user_email = $1 AND school_id = $2 AND event_id = $3
                    "#,
                )
                .bind(email)
                .bind(school_id)
                .bind(event_id)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn subscriptions(
        &self,
        email: &str,
        school_id: i64,
    ) -> StoreResult<Vec<(i64, SubscriptionState)>> {
        let rows = sqlx::query(
            r#"
            SELECT club_id, subscribed_or_blocked
            FROM subscriptions
            WHERE user_email = $1 AND school_id = $2 AND is_active
            ORDER BY club_id
            "#,
        )
        .bind(email)
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let flag: i16 = row.try_get("subscribed_or_blocked")?;
                let state = SubscriptionState::from_flag(flag)
                    .ok_or_else(|| invalid("subscribed_or_blocked", flag.to_string()))?;
                Ok((row.try_get("club_id")?, state))
            })
            .collect()
    }
}

impl ReportStore for PgStore {
    async fn run_report(&self, school_id: i64, kind: ReportKind) -> StoreResult<Vec<ReportRow>> {
        let rows = sqlx::query(kind.statement())
            .bind(school_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ReportRow {
                    label: row.try_get("label")?,
                    value: row.try_get("value")?,
                })
            })
            .collect()
    }
}
