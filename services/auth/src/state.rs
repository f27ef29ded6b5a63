//! Application state shared across handlers

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use campus::{SessionValidator, mail::AnyMailer, settings::Settings, store::PgStore};
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::UserRepository,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: PgStore,
    pub validator: SessionValidator<PgStore>,
    pub user_repository: UserRepository,
    pub rate_limiter: RateLimiter,
    pub mailer: AnyMailer,
    pub cookie_key: Key,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(pool: PgPool, settings: Settings, cookie_key: Key) -> Self {
        let store = PgStore::new(pool);
        let user_repository = UserRepository::new(store.pool().clone());
        let validator =
            SessionValidator::new(store.clone()).with_idle_timeout(settings.idle_timeout());

        Self {
            store,
            validator,
            user_repository,
            rate_limiter: RateLimiter::new(RateLimiterConfig::default()),
            mailer: settings.mailer(),
            cookie_key,
            settings: Arc::new(settings),
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
