//! Admin and observability HTTP surface.
//!
//! Every `/v1` route except session creation authenticates with a bearer
//! token that must be a live admin session. Session creation is expected
//! to sit behind the platform's authentication gateway; it takes the
//! already-authenticated user id.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use atrium_common::{OrgId, SessionToken, UserId};

use crate::app::AppState;
use crate::errors::{DomainError, SessionError, StoreError};
use crate::model::{AdminSession, CustomDomain};

/// Build the router over the shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/v1/sessions", post(create_session))
        .route(
            "/v1/sessions/current",
            get(current_session).delete(revoke_current_session),
        )
        .route("/v1/sessions/others", delete(revoke_other_sessions))
        .route("/v1/domains", post(add_domain).get(list_domains))
        .route("/v1/domains/{id}", get(get_domain))
        .route("/v1/domains/{id}/verify", post(verify_domain))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// API-level error with an HTTP status.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Unauthorized => Self::unauthorized(),
            SessionError::NotFound => Self::new(StatusCode::NOT_FOUND, "Session not found"),
            SessionError::Store(store) => store.into(),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound => Self::new(StatusCode::NOT_FOUND, "Domain not found"),
            DomainError::WildcardForbidden => Self::new(StatusCode::FORBIDDEN, e.to_string()),
            DomainError::InvalidName(_) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            DomainError::Store(store) => store.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(_) => Self::new(StatusCode::CONFLICT, e.to_string()),
            _ => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Store failure"),
        }
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

fn bearer_token(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(SessionToken::from)
}

/// Validate the request's bearer token into a live session.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AdminSession, ApiError> {
    let token = bearer_token(headers).ok_or_else(ApiError::unauthorized)?;
    Ok(state.sessions.validate_session(&token).await?)
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// Session fields safe to echo back (no token).
#[derive(Debug, Serialize)]
struct SessionView {
    id: Uuid,
    user_id: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl From<&AdminSession> for SessionView {
    fn from(s: &AdminSession) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id.to_string(),
            ip_address: s.ip_address.clone(),
            user_agent: s.user_agent.clone(),
            created_at: s.created_at,
            expires_at: s.expires_at,
            last_activity: s.last_activity,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    user_id: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    /// The bearer token; shown exactly once.
    token: String,
    session: SessionView,
}

#[derive(Debug, Deserialize)]
struct AddDomainRequest {
    organization_id: String,
    domain: String,
}

#[derive(Debug, Serialize)]
struct DomainView {
    id: Uuid,
    domain: String,
    organization_id: String,
    status: crate::model::DomainStatus,
    verification_token: String,
    /// The exact TXT record value the tenant must publish.
    expected_txt_record: String,
    verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl DomainView {
    fn new(domain: &CustomDomain, prefix: &str) -> Self {
        Self {
            id: domain.id,
            domain: domain.domain.clone(),
            organization_id: domain.organization_id.to_string(),
            status: domain.status,
            verification_token: domain.verification_token.clone(),
            expected_txt_record: domain.expected_txt_record(prefix),
            verified_at: domain.verified_at,
            created_at: domain.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds();
    Json(json!({
        "status": "ok",
        "uptime_secs": uptime_secs,
        "cache_breaker": state.cache.breaker_state(),
    }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .sessions
        .create_session(UserId::new(body.user_id), body.ip_address, body.user_agent)
        .await?;

    debug!(session_id = %session.id, "Session created via API");
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            token: session.token.as_str().to_string(),
            session: SessionView::from(&session),
        }),
    ))
}

async fn current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionView>, ApiError> {
    let session = authenticate(&state, &headers).await?;
    Ok(Json(SessionView::from(&session)))
}

async fn revoke_current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let session = authenticate(&state, &headers).await?;
    state.sessions.revoke_session(&session.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn revoke_other_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = authenticate(&state, &headers).await?;
    let revoked = state
        .sessions
        .revoke_other_sessions(&session.user_id, &session.token)
        .await?;
    Ok(Json(json!({ "revoked": revoked })))
}

async fn add_domain(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AddDomainRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authenticate(&state, &headers).await?;
    let domain = state
        .domains
        .add_domain(OrgId::new(body.organization_id), &body.domain)
        .await?;
    let view = DomainView::new(&domain, state.domains.verification_prefix());
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_domains(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<DomainView>>, ApiError> {
    authenticate(&state, &headers).await?;
    let domains = state.domains.list_domains().await?;
    let prefix = state.domains.verification_prefix();
    Ok(Json(
        domains.iter().map(|d| DomainView::new(d, prefix)).collect(),
    ))
}

async fn get_domain(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authenticate(&state, &headers).await?;
    let domain = state.domains.domain(id).await?;
    let certificate = state.domains.certificate_for(id).await?;
    let view = DomainView::new(&domain, state.domains.verification_prefix());
    Ok(Json(json!({
        "domain": view,
        "certificate": certificate.map(|c| json!({
            "status": c.status,
            "issued_at": c.issued_at,
            "expires_at": c.expires_at,
        })),
    })))
}

async fn verify_domain(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DomainView>, ApiError> {
    authenticate(&state, &headers).await?;
    let domain = state.domains.verify_domain(id).await?;
    Ok(Json(DomainView::new(
        &domain,
        state.domains.verification_prefix(),
    )))
}
