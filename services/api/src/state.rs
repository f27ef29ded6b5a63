//! Application state shared across handlers

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use campus::{SessionValidator, Store};
use chrono::TimeDelta;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState<S> {
    pub store: S,
    pub validator: SessionValidator<S>,
    pub cookie_key: Key,
    pub secure_cookies: bool,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, idle_timeout: TimeDelta, cookie_key: Key, secure_cookies: bool) -> Self {
        Self {
            validator: SessionValidator::new(store.clone()).with_idle_timeout(idle_timeout),
            store,
            cookie_key,
            secure_cookies,
        }
    }
}

impl<S> FromRef<AppState<S>> for Key {
    fn from_ref(state: &AppState<S>) -> Self {
        state.cookie_key.clone()
    }
}
