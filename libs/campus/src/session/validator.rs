//! Per-request session validation

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, info};

use super::SessionContext;
use crate::{
    error::StoreError,
    models::{UserContext, Viewer},
    store::{SessionStore, UserStore, load_user_context},
};

/// Idle timeout applied when none is configured
pub const DEFAULT_IDLE_TIMEOUT_MINUTES: i64 = 15;

/// Why a validation ended the way it did. Every variant except
/// `Authenticated` collapses to [`Viewer::Anonymous`].
#[derive(Debug)]
pub enum Outcome {
    Authenticated(UserContext),
    LoggedOut,
    NoSession,
    IdleTimeout,
    UnknownSession,
    ExpiredSession,
    UnknownUser,
    Banned,
    StoreError(StoreError),
}

impl Outcome {
    pub fn into_viewer(self) -> Viewer {
        match self {
            Outcome::Authenticated(user) => Viewer::Authenticated(user),
            _ => Viewer::Anonymous,
        }
    }

    fn log(&self) {
        match self {
            Outcome::Authenticated(user) => debug!(user = %user.email, "Session validated"),
            Outcome::NoSession | Outcome::LoggedOut => debug!("No active session"),
            Outcome::IdleTimeout => info!("Session idle timeout"),
            Outcome::UnknownSession => info!("Session token not found"),
            Outcome::ExpiredSession => info!("Session past its expiry"),
            Outcome::UnknownUser => info!("Session user missing or inactive"),
            Outcome::Banned => info!("Session user is banned"),
            Outcome::StoreError(e) => error!(error = %e, "Session validation store failure"),
        }
    }
}

/// Turns a request's [`SessionContext`] into a [`Viewer`]
#[derive(Clone)]
pub struct SessionValidator<S> {
    store: S,
    idle_timeout: TimeDelta,
}

impl<S: SessionStore + UserStore> SessionValidator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            idle_timeout: TimeDelta::minutes(DEFAULT_IDLE_TIMEOUT_MINUTES),
        }
    }

    /// Shorten the idle timeout. Values above the default are clamped to it.
    pub fn with_idle_timeout(mut self, idle_timeout: TimeDelta) -> Self {
        self.idle_timeout = idle_timeout.min(TimeDelta::minutes(DEFAULT_IDLE_TIMEOUT_MINUTES));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate against the current time
    pub async fn validate(&self, ctx: &mut SessionContext) -> Viewer {
        self.validate_at(ctx, Utc::now()).await
    }

    /// Validate at `now`. Clears the context on every failure and refreshes
    /// its activity timestamp on success.
    pub async fn validate_at(&self, ctx: &mut SessionContext, now: DateTime<Utc>) -> Viewer {
        let outcome = self.check(ctx, now).await;
        outcome.log();

        match &outcome {
            Outcome::Authenticated(_) => ctx.touch(now),
            _ => ctx.clear(),
        }
        outcome.into_viewer()
    }

    /// Run the checks without touching the context
    pub async fn check(&self, ctx: &SessionContext, now: DateTime<Utc>) -> Outcome {
        if ctx.logged_out {
            return Outcome::LoggedOut;
        }
        let Some(token) = ctx.token.as_deref() else {
            return Outcome::NoSession;
        };
        if ctx.is_idle(now, self.idle_timeout) {
            return Outcome::IdleTimeout;
        }

        match self.resolve(token, now).await {
            Ok(outcome) => outcome,
            Err(e) => Outcome::StoreError(e),
        }
    }

    async fn resolve(&self, token: &str, now: DateTime<Utc>) -> Result<Outcome, StoreError> {
        let Some(session) = self.store.find_session(token).await? else {
            return Ok(Outcome::UnknownSession);
        };
        if session.is_expired(now) {
            return Ok(Outcome::ExpiredSession);
        }

        let Some(user) = self
            .store
            .find_active_user(&session.user_email, session.school_id)
            .await?
        else {
            return Ok(Outcome::UnknownUser);
        };
        if user.is_banned {
            return Ok(Outcome::Banned);
        }

        let context = load_user_context(&self.store, &user).await?;
        Ok(Outcome::Authenticated(context))
    }
}
