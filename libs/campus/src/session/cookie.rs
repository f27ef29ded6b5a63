//! Signed cookie carrying the [`SessionContext`] between requests

use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};

use super::SessionContext;

pub const SESSION_COOKIE: &str = "campus_session";

/// Read the context from the jar. A missing or tampered cookie yields an
/// empty context.
pub fn read_context(jar: &SignedCookieJar) -> SessionContext {
    jar.get(SESSION_COOKIE)
        .map(|cookie| SessionContext::decode(cookie.value()))
        .unwrap_or_default()
}

/// Write the context back into the jar
pub fn store_context(jar: SignedCookieJar, ctx: &SessionContext, secure: bool) -> SignedCookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, ctx.encode()))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax),
    )
}
