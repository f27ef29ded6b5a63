//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use campus::{
    Capability, EventQuery, EventQueryError, EventView, Store, UserContext, Viewer, list_events,
    models::{RsvpState, SubscriptionState},
    preferences::{PreferenceField, PreferenceUpdate},
    reports::{ReportKind, ReportRow},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::{
    error::{ApiError, ApiResult},
    middleware::{require, require_user, session_middleware},
    state::AppState,
};

/// Query parameters of the event listing
#[derive(Debug, Deserialize)]
pub struct EventsParams {
    pub start: String,
    pub end: String,
    pub filter: Option<String>,
    /// Defaults to approved events only
    pub approved: Option<bool>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionChange {
    Subscribed,
    Blocked,
    None,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    pub state: SubscriptionChange,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsvpChange {
    Rsvp,
    Block,
    None,
}

#[derive(Debug, Deserialize)]
pub struct RsvpRequest {
    pub state: RsvpChange,
}

/// One active subscription row of the viewer
#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub club_id: i64,
    pub state: SubscriptionState,
}

#[derive(Debug, Deserialize)]
pub struct PreferenceRequest {
    pub field: PreferenceField,
    pub value: String,
}

/// Create the router for the API service
pub fn create_router<S: Store>(state: AppState<S>) -> Router {
    let protected_routes = Router::new()
        .route("/me", get(me))
        .route("/me/preferences", put(update_preference::<S>))
        .route("/me/subscriptions", get(subscriptions::<S>))
        .route("/events", get(events::<S>))
        .route("/events/:id/rsvp", put(set_rsvp::<S>))
        .route("/events/:id/approve", post(approve_event::<S>))
        .route("/clubs/:id/subscription", put(set_subscription::<S>))
        .route(
            "/clubs/:club_id/events/:event_id/host-approval",
            post(approve_host::<S>),
        )
        .route("/reports/:kind", get(report::<S>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware::<S>,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service"
    }))
}

/// The signed-in user's context
pub async fn me(Extension(viewer): Extension<Viewer>) -> ApiResult<Json<UserContext>> {
    let user = require_user(&viewer)?;
    Ok(Json(user.clone()))
}

/// Events visible to the viewer in a date range
pub async fn events<S: Store>(
    State(state): State<AppState<S>>,
    Extension(viewer): Extension<Viewer>,
    Query(params): Query<EventsParams>,
) -> ApiResult<Json<Vec<EventView>>> {
    let approved_only = params.approved.unwrap_or(true);
    let user = if approved_only {
        require_user(&viewer)?
    } else {
        require(&viewer, Capability::IsFaculty)?
    };

    let query = EventQuery::parse(
        &params.start,
        &params.end,
        params.filter.as_deref(),
        approved_only,
    )
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let events = list_events(&state.store, user, &query)
        .await
        .map_err(|e| match e {
            EventQueryError::Store(err) => ApiError::from_store("list events", err),
            other => ApiError::BadRequest(other.to_string()),
        })?;

    Ok(Json(events))
}

/// Clubs the viewer subscribes to or blocks
pub async fn subscriptions<S: Store>(
    State(state): State<AppState<S>>,
    Extension(viewer): Extension<Viewer>,
) -> ApiResult<Json<Vec<SubscriptionView>>> {
    let user = require_user(&viewer)?;

    let rows = state
        .store
        .subscriptions(&user.email, user.school_id)
        .await
        .map_err(|e| ApiError::from_store("list subscriptions", e))?;

    Ok(Json(
        rows.into_iter()
            .map(|(club_id, state)| SubscriptionView { club_id, state })
            .collect(),
    ))
}

/// Subscribe to, block or forget a club
pub async fn set_subscription<S: Store>(
    State(state): State<AppState<S>>,
    Extension(viewer): Extension<Viewer>,
    Path(club_id): Path<i64>,
    Json(payload): Json<SubscriptionRequest>,
) -> ApiResult<StatusCode> {
    let user = require_user(&viewer)?;
    let subscription = match payload.state {
        SubscriptionChange::Subscribed => Some(SubscriptionState::Subscribed),
        SubscriptionChange::Blocked => Some(SubscriptionState::Blocked),
        SubscriptionChange::None => None,
    };

    state
        .store
        .set_subscription(&user.email, user.school_id, club_id, subscription)
        .await
        .map_err(|e| ApiError::from_store("update subscription", e))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Attend, decline or forget an event
pub async fn set_rsvp<S: Store>(
    State(state): State<AppState<S>>,
    Extension(viewer): Extension<Viewer>,
    Path(event_id): Path<i64>,
    Json(payload): Json<RsvpRequest>,
) -> ApiResult<StatusCode> {
    let user = require_user(&viewer)?;
    let rsvp = match payload.state {
        RsvpChange::Rsvp => Some(RsvpState::Rsvp),
        RsvpChange::Block => Some(RsvpState::Block),
        RsvpChange::None => None,
    };

    state
        .store
        .set_rsvp(&user.email, user.school_id, event_id, rsvp)
        .await
        .map_err(|e| ApiError::from_store("update rsvp", e))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Faculty approval of an event
pub async fn approve_event<S: Store>(
    State(state): State<AppState<S>>,
    Extension(viewer): Extension<Viewer>,
    Path(event_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let user = require(&viewer, Capability::IsFaculty)?;

    let approved = state
        .store
        .approve_event(user.school_id, event_id)
        .await
        .map_err(|e| ApiError::from_store("approve event", e))?;
    if !approved {
        return Err(ApiError::NotFound(format!("event {event_id}")));
    }

    info!(event = event_id, by = %user.email, "Event approved");
    Ok(StatusCode::NO_CONTENT)
}

/// A club admin accepting a co-host relation for their club
pub async fn approve_host<S: Store>(
    State(state): State<AppState<S>>,
    Extension(viewer): Extension<Viewer>,
    Path((club_id, event_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let user = require(&viewer, Capability::IsClubAdmin(club_id))?;

    let approved = state
        .store
        .approve_host(user.school_id, event_id, club_id)
        .await
        .map_err(|e| ApiError::from_store("approve host", e))?;
    if !approved {
        return Err(ApiError::NotFound(format!(
            "host relation of club {club_id} to event {event_id}"
        )));
    }

    info!(event = event_id, club = club_id, by = %user.email, "Host approved");
    Ok(StatusCode::NO_CONTENT)
}

/// Change one of the viewer's own preferences
pub async fn update_preference<S: Store>(
    State(state): State<AppState<S>>,
    Extension(viewer): Extension<Viewer>,
    Json(payload): Json<PreferenceRequest>,
) -> ApiResult<StatusCode> {
    let user = require_user(&viewer)?;
    let update = PreferenceUpdate::parse(payload.field, &payload.value)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state
        .store
        .update_preference(&user.email, user.school_id, &update)
        .await
        .map_err(|e| ApiError::from_store("update preference", e))?;

    Ok(StatusCode::NO_CONTENT)
}

/// One of the fixed faculty reports for the viewer's school
pub async fn report<S: Store>(
    State(state): State<AppState<S>>,
    Extension(viewer): Extension<Viewer>,
    Path(kind): Path<String>,
) -> ApiResult<Json<Vec<ReportRow>>> {
    let user = require(&viewer, Capability::IsFaculty)?;
    let kind: ReportKind = kind.parse().map_err(ApiError::NotFound)?;

    let rows = state
        .store
        .run_report(user.school_id, kind)
        .await
        .map_err(|e| {
            error!("Failed to run report {}: {}", kind.slug(), e);
            ApiError::InternalServerError
        })?;

    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
        response::Response,
    };
    use axum_extra::extract::cookie::{Key, SignedCookieJar};
    use campus::{
        SessionStore, UserStore,
        models::Gender,
        session::{SessionContext, cookie::store_context},
        store::{MemoryStore, NewEvent},
        test_support::{faculty, user},
    };
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use serde_json::Value;
    use tower::ServiceExt;

    struct Harness {
        store: MemoryStore,
        key: Key,
        app: Router,
    }

    impl Harness {
        fn new() -> Self {
            let store = MemoryStore::new();
            let key = Key::generate();
            let state = AppState::new(store.clone(), TimeDelta::minutes(15), key.clone(), false);
            Self {
                store,
                key,
                app: create_router(state),
            }
        }

        /// Log a stored user in and return the cookie header value
        async fn login(&self, email: &str, school_id: i64) -> String {
            self.login_at(email, school_id, Utc::now()).await
        }

        async fn login_at(&self, email: &str, school_id: i64, last_activity: DateTime<Utc>) -> String {
            let session = self
                .store
                .create_session(email, school_id, Utc::now() + TimeDelta::hours(24))
                .await
                .unwrap();
            let ctx = SessionContext::started(session.token, last_activity);
            let jar = store_context(SignedCookieJar::new(self.key.clone()), &ctx, false);
            let response = jar.into_response();
            let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
            set_cookie.split(';').next().unwrap().to_string()
        }

        async fn send(&self, request: Request<Body>) -> Response {
            self.app.clone().oneshot(request).await.unwrap()
        }
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn send_json(method: &str, uri: &str, cookie: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post(uri: &str, cookie: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    const WEEK: &str = "/events?start=2024-05-01&end=2024-05-07";

    #[tokio::test]
    async fn test_health_is_public() {
        let harness = Harness::new();
        let response = harness.send(get("/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_me_requires_session() {
        let harness = Harness::new();
        let response = harness.send(get("/me", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = json_body(response).await;
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_me_returns_context_and_refreshes_cookie() {
        let harness = Harness::new();
        harness.store.add_user(user("ada@school.edu", 1));
        let cookie = harness.login("ada@school.edu", 1).await;

        let response = harness.send(get("/me", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::SET_COOKIE));

        let body = json_body(response).await;
        assert_eq!(body["email"], "ada@school.edu");
        assert_eq!(body["is_faculty"], false);
    }

    #[tokio::test]
    async fn test_idle_session_is_anonymous() {
        let harness = Harness::new();
        harness.store.add_user(user("ada@school.edu", 1));
        let cookie = harness
            .login_at("ada@school.edu", 1, Utc::now() - TimeDelta::minutes(20))
            .await;

        let response = harness.send(get("/me", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_suggested_events_respect_gender_gate() {
        let harness = Harness::new();
        let mut ada = user("ada@school.edu", 1);
        ada.gender = Some(Gender::Female);
        harness.store.add_user(ada);
        harness.store.set_user_tags("ada@school.edu", 1, &["Music"]);
        harness.store.add_event(
            NewEvent::new(1, "Men's choir", at(2, 18))
                .restricted_to(Gender::Male)
                .tagged(&["Music"]),
        );
        let open = harness
            .store
            .add_event(NewEvent::new(1, "Open mic", at(3, 18)).tagged(&["Music"]));
        let cookie = harness.login("ada@school.edu", 1).await;

        let response = harness
            .send(get(&format!("{WEEK}&filter=Suggested"), Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let ids: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![open]);
    }

    #[tokio::test]
    async fn test_pending_events_are_faculty_only() {
        let harness = Harness::new();
        harness.store.add_user(user("ada@school.edu", 1));
        harness.store.add_user(faculty("dean@school.edu", 1));
        let pending = harness
            .store
            .add_event(NewEvent::new(1, "Draft", at(2, 12)).pending());

        let student = harness.login("ada@school.edu", 1).await;
        let response = harness
            .send(get(&format!("{WEEK}&approved=false"), Some(&student)))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let dean = harness.login("dean@school.edu", 1).await;
        let response = harness
            .send(get(&format!("{WEEK}&approved=false"), Some(&dean)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body[0]["id"].as_i64(), Some(pending));
    }

    #[tokio::test]
    async fn test_bad_event_parameters() {
        let harness = Harness::new();
        harness.store.add_user(user("ada@school.edu", 1));
        let cookie = harness.login("ada@school.edu", 1).await;

        for uri in [
            "/events?start=May&end=2024-05-07",
            "/events?start=2024-05-07&end=2024-05-01",
            "/events?start=2024-05-02&end=2024-05-01",
            "/events?start=2024-05-01&end=2024-05-07&filter=Popular",
        ] {
            let response = harness.send(get(uri, Some(&cookie))).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_resubscribe_keeps_single_row() {
        let harness = Harness::new();
        harness.store.add_user(user("ada@school.edu", 1));
        let club = harness.store.add_club(1, "Chess");
        let cookie = harness.login("ada@school.edu", 1).await;
        let uri = format!("/clubs/{club}/subscription");

        for state in ["subscribed", "none", "subscribed"] {
            let response = harness
                .send(send_json("PUT", &uri, &cookie, json!({"state": state})))
                .await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }
        let body = json_body(harness.send(get("/me/subscriptions", Some(&cookie))).await).await;
        assert_eq!(body, json!([{"club_id": club, "state": "subscribed"}]));

        let response = harness
            .send(send_json(
                "PUT",
                "/clubs/999/subscription",
                &cookie,
                json!({"state": "subscribed"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rsvp_shows_in_attending() {
        let harness = Harness::new();
        harness.store.add_user(user("ada@school.edu", 1));
        let event = harness.store.add_event(NewEvent::new(1, "Talk", at(2, 12)));
        let cookie = harness.login("ada@school.edu", 1).await;

        let response = harness
            .send(send_json(
                "PUT",
                &format!("/events/{event}/rsvp"),
                &cookie,
                json!({"state": "rsvp"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = harness
            .send(get(&format!("{WEEK}&filter=Attending"), Some(&cookie)))
            .await;
        let body = json_body(response).await;
        assert_eq!(body[0]["rsvp"], "rsvp");
    }

    #[tokio::test]
    async fn test_event_approval_requires_faculty() {
        let harness = Harness::new();
        harness.store.add_user(user("ada@school.edu", 1));
        harness.store.add_user(faculty("dean@school.edu", 1));
        let event = harness
            .store
            .add_event(NewEvent::new(1, "Draft", at(2, 12)).pending());
        let uri = format!("/events/{event}/approve");

        let student = harness.login("ada@school.edu", 1).await;
        assert_eq!(
            harness.send(post(&uri, &student)).await.status(),
            StatusCode::FORBIDDEN
        );

        let dean = harness.login("dean@school.edu", 1).await;
        assert_eq!(
            harness.send(post(&uri, &dean)).await.status(),
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            harness.send(post("/events/999/approve", &dean)).await.status(),
            StatusCode::NOT_FOUND
        );

        let body = json_body(harness.send(get(WEEK, Some(&student))).await).await;
        assert_eq!(body[0]["id"].as_i64(), Some(event));
    }

    #[tokio::test]
    async fn test_host_approval_requires_club_admin() {
        let harness = Harness::new();
        harness.store.add_user(user("ada@school.edu", 1));
        let own = harness.store.add_club(1, "Band");
        let other = harness.store.add_club(1, "Choir");
        harness.store.add_club_admin(own, "ada@school.edu", 1);
        let event = harness.store.add_event(NewEvent::new(1, "Gala", at(2, 20)));
        harness.store.add_host(event, own, false);
        harness.store.add_host(event, other, false);
        let cookie = harness.login("ada@school.edu", 1).await;

        let response = harness
            .send(post(&format!("/clubs/{other}/events/{event}/host-approval"), &cookie))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = harness
            .send(post(&format!("/clubs/{own}/events/{event}/host-approval"), &cookie))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let body = json_body(harness.send(get(WEEK, Some(&cookie))).await).await;
        assert_eq!(body[0]["hosts"][0]["name"], "Band");
        assert_eq!(body[0]["hosts"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_preference_update() {
        let harness = Harness::new();
        harness.store.add_user(user("ada@school.edu", 1));
        let cookie = harness.login("ada@school.edu", 1).await;

        let response = harness
            .send(send_json(
                "PUT",
                "/me/preferences",
                &cookie,
                json!({"field": "email_frequency", "value": "hourly"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = harness
            .send(send_json(
                "PUT",
                "/me/preferences",
                &cookie,
                json!({"field": "email_frequency", "value": "Weekly"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let stored = harness
            .store
            .find_active_user("ada@school.edu", 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.email_frequency.as_str(), "Weekly");
    }

    #[tokio::test]
    async fn test_reports_are_faculty_only() {
        let harness = Harness::new();
        harness.store.add_user(user("ada@school.edu", 1));
        harness.store.add_user(faculty("dean@school.edu", 1));
        harness.store.add_club(1, "Chess");

        let student = harness.login("ada@school.edu", 1).await;
        let response = harness
            .send(get("/reports/club-subscribers", Some(&student)))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let dean = harness.login("dean@school.edu", 1).await;
        let response = harness.send(get("/reports/users", Some(&dean))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = harness
            .send(get("/reports/club-subscribers", Some(&dean)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body[0]["label"], "Chess");
        assert_eq!(body[0]["value"], 0);
    }
}
