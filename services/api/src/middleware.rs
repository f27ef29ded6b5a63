//! Session middleware
//!
//! Every protected request is validated against its session cookie. The
//! resulting [`Viewer`] is placed in the request extensions and the updated
//! context is written back to the cookie.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::SignedCookieJar;
use campus::{
    Capability, Store, UserContext, Viewer, authorize,
    session::cookie::{SESSION_COOKIE, read_context, store_context},
};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Validate the session cookie and attach the viewer
pub async fn session_middleware<S: Store>(
    State(state): State<AppState<S>>,
    jar: SignedCookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let had_cookie = jar.get(SESSION_COOKIE).is_some();
    let mut ctx = read_context(&jar);
    let viewer = state.validator.validate(&mut ctx).await;
    req.extensions_mut().insert(viewer);

    let response = next.run(req).await;
    if had_cookie {
        (store_context(jar, &ctx, state.secure_cookies), response).into_response()
    } else {
        response
    }
}

/// The authenticated user, or 401
pub fn require_user(viewer: &Viewer) -> ApiResult<&UserContext> {
    viewer.user().ok_or(ApiError::Unauthorized)
}

/// 401 for anonymous viewers, 403 when the capability is missing
pub fn require<'a>(viewer: &'a Viewer, capability: Capability<'_>) -> ApiResult<&'a UserContext> {
    let user = require_user(viewer)?;
    if !authorize(viewer, capability) {
        return Err(ApiError::Forbidden);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus::test_support::{context, faculty, user};

    #[test]
    fn test_require_returns_the_authorized_user() {
        let dean = Viewer::Authenticated(context(&faculty("dean@school.edu", 1)));
        let found = require(&dean, Capability::IsFaculty).unwrap();
        assert_eq!(found.email, "dean@school.edu");

        let student = Viewer::Authenticated(context(&user("ada@school.edu", 1)));
        assert!(matches!(
            require(&student, Capability::IsFaculty),
            Err(ApiError::Forbidden)
        ));
        assert!(matches!(
            require(&Viewer::Anonymous, Capability::IsSelf("ada@school.edu")),
            Err(ApiError::Unauthorized)
        ));
    }
}
