use crate::error::HttpApiError;
use crate::state::{ActiveSession, AppState, UserRecord};
use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use drill_content::start_session;
use drill_core::{
    generate_user_id, Action, ActivityRecord, BadgeDef, Difficulty, EventEnvelope, FlagId,
    SessionId, SessionSummary, SessionView, SimulationId, Track, UserId,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, HeaderValue::from_static("http://localhost:5173"))
}

pub fn make_router_with_cors(state: AppState, cors_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/tracks", get(tracks_handler))
        .route("/api/v1/badges", get(badges_handler))
        .route("/api/v1/users", post(create_user_handler))
        .route("/api/v1/users/:id/progress", get(progress_handler))
        .route("/api/v1/sessions", post(create_session_handler))
        .route(
            "/api/v1/sessions/:id",
            get(session_handler).delete(end_session_handler),
        )
        .route("/api/v1/sessions/:id/flags/:flag_id", post(flag_handler))
        .route("/api/v1/sessions/:id/undo", post(undo_handler))
        .route("/api/v1/sessions/:id/next", post(next_handler))
        .route("/api/v1/sessions/:id/previous", post(previous_handler))
        .route("/api/v1/stream", get(stream_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub async fn meta_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let active_sessions = app_state.sessions.lock().len();
    let users = app_state.store.lock().len();
    Json(serde_json::json!({
        "content_version": app_state.content.content_version,
        "tracks": app_state.content.tracks.len(),
        "active_sessions": active_sessions,
        "users": users,
    }))
}

#[derive(Serialize)]
pub struct TrackSummary {
    track: Track,
    simulation_id: SimulationId,
    display_name: String,
    difficulty: Difficulty,
    examples: usize,
    total_flags: usize,
}

pub async fn tracks_handler(State(app_state): State<AppState>) -> Json<Vec<TrackSummary>> {
    let tracks = app_state
        .content
        .tracks
        .iter()
        .map(|def| TrackSummary {
            track: def.track,
            simulation_id: def.simulation_id.clone(),
            display_name: def.display_name.clone(),
            difficulty: def.difficulty,
            examples: def.examples.len(),
            total_flags: def.total_flags(),
        })
        .collect();
    Json(tracks)
}

pub async fn badges_handler(State(app_state): State<AppState>) -> Json<Vec<BadgeDef>> {
    Json(app_state.content.badges.clone())
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateUserRequest {
    display_name: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    id: UserId,
    display_name: String,
    created_at: DateTime<Utc>,
}

pub async fn create_user_handler(
    State(app_state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), HttpApiError> {
    let display_name = request.display_name.trim();
    if display_name.is_empty() {
        return Err(HttpApiError::invalid_request("display_name must not be empty"));
    }
    let id = generate_user_id(&mut *app_state.rng.lock());
    let record = UserRecord::new(id.clone(), display_name);
    let response = UserResponse {
        id: id.clone(),
        display_name: record.display_name.clone(),
        created_at: record.created_at,
    };
    app_state.store.lock().insert(id, record);
    tracing::info!(user = %response.id, "user created");
    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Serialize)]
pub struct ProgressResponse {
    user: UserId,
    display_name: String,
    points: i64,
    level: i64,
    badges: Vec<BadgeDef>,
    completed_simulations: Vec<SimulationId>,
    recent_activity: Vec<ActivityRecord>,
}

pub async fn progress_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProgressResponse>, HttpApiError> {
    let users = app_state.store.lock();
    let record = users
        .get(&UserId::from(id.as_str()))
        .ok_or_else(|| HttpApiError::user_not_found(&id))?;
    let progress = record.tracker.progress();
    let content = &app_state.content;
    Ok(Json(ProgressResponse {
        user: record.id.clone(),
        display_name: record.display_name.clone(),
        points: progress.points,
        level: progress.level(content.rewards.points_per_level),
        badges: progress
            .badges
            .iter()
            .filter_map(|badge| content.badge(badge).cloned())
            .collect(),
        completed_simulations: progress.completed_simulations.iter().cloned().collect(),
        recent_activity: record.tracker.activity().cloned().collect(),
    }))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    user_id: UserId,
    track: Track,
}

pub async fn create_session_handler(
    State(app_state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), HttpApiError> {
    if !app_state.store.lock().contains_key(&request.user_id) {
        return Err(HttpApiError::user_not_found(&request.user_id.0));
    }
    let tracker = app_state.tracker_for(&request.user_id);
    let session = {
        let mut rng = app_state.rng.lock();
        start_session(&app_state.content, request.track, tracker, &mut *rng)
    }
    .map_err(|err| HttpApiError::internal(format!("{err:#}")))?;

    let view = session.view();
    tracing::info!(
        session = %view.session,
        user = %request.user_id,
        track = %request.track,
        "session started"
    );
    app_state
        .sessions
        .lock()
        .insert(session.id().clone(), ActiveSession::new(session));
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn session_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, HttpApiError> {
    let mut sessions = app_state.sessions.lock();
    let session = sessions
        .get_mut(&SessionId::from(id.as_str()))
        .ok_or_else(|| HttpApiError::session_not_found(&id))?
        .touch();
    Ok(Json(session.view()))
}

#[derive(Serialize)]
pub struct ActionResponse {
    events: Vec<EventEnvelope>,
    view: SessionView,
}

/// Applies `action` and broadcasts its events. A rejection answers 409 with
/// the untouched view.
fn apply_action(
    app_state: &AppState,
    id: &str,
    action: &Action,
) -> Result<Json<ActionResponse>, HttpApiError> {
    let mut sessions = app_state.sessions.lock();
    let session = sessions
        .get_mut(&SessionId::from(id))
        .ok_or_else(|| HttpApiError::session_not_found(id))?
        .touch();
    match session.apply(action) {
        Ok(events) => {
            let view = session.view();
            drop(sessions);
            if !events.is_empty() {
                let _ = app_state.event_tx.send(events.clone());
            }
            Ok(Json(ActionResponse { events, view }))
        }
        Err(rejection) => Err(HttpApiError::rejected(rejection, session.view())),
    }
}

pub async fn flag_handler(
    State(app_state): State<AppState>,
    Path((id, flag_id)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, HttpApiError> {
    let action = Action::MarkFound {
        flag: FlagId(flag_id),
    };
    apply_action(&app_state, &id, &action)
}

pub async fn undo_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, HttpApiError> {
    apply_action(&app_state, &id, &Action::Undo)
}

pub async fn next_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, HttpApiError> {
    apply_action(&app_state, &id, &Action::Next)
}

pub async fn previous_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, HttpApiError> {
    apply_action(&app_state, &id, &Action::Previous)
}

#[derive(Serialize)]
pub struct EndSessionResponse {
    session: SessionId,
    complete: bool,
    summary: SessionSummary,
}

/// Return to dashboard. Points already awarded stay with the user.
pub async fn end_session_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EndSessionResponse>, HttpApiError> {
    let mut session = app_state
        .sessions
        .lock()
        .remove(&SessionId::from(id.as_str()))
        .ok_or_else(|| HttpApiError::session_not_found(&id))?
        .session;
    session.exit();
    tracing::info!(session = %id, complete = session.is_complete(), "session ended");
    Ok(Json(EndSessionResponse {
        session: session.id().clone(),
        complete: session.is_complete(),
        summary: session.summary(),
    }))
}

// ---------------------------------------------------------------------------
// Event stream
// ---------------------------------------------------------------------------

pub async fn stream_handler(
    State(app_state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app_state.event_tx.subscribe();
    let sessions = app_state.sessions.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_secs(5));
        heartbeat.tick().await; // discard the immediate first tick
        let mut flush = tokio::time::interval(Duration::from_millis(50));
        flush.tick().await; // discard the immediate first tick
        let mut pending: Vec<EventEnvelope> = Vec::new();
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(events) => pending.extend(events),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = flush.tick() => {
                    if !pending.is_empty() {
                        let data = serde_json::to_string(&pending).unwrap_or_default();
                        pending.clear();
                        yield Ok(Event::default().data(data));
                    }
                }
                _ = heartbeat.tick() => {
                    let active = sessions.lock().len();
                    let hb = serde_json::json!({"heartbeat": true, "active_sessions": active});
                    yield Ok(Event::default().data(hb.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}
