// src/routes/session_routes.rs

use axum::{
    Json, Router,
    extract::State,
    routing::post,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{generate_access_token, hash_access_token},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, NewSession, Role},
};

pub fn router() -> Router<AppState> {
    Router::new()
        // /api/session
        .route("/", post(login).get(me).delete(logout))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub session_id: Uuid,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginData>>, ApiError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::validation("Please enter a username"));
    }

    let access_token = generate_access_token();
    let expires_at = Duration::try_hours(state.session_ttl_hours)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| ApiError::Internal("session TTL out of range".into()))?;

    let session = state
        .store
        .insert_session(NewSession {
            token_hash: hash_access_token(&access_token),
            username: username.to_string(),
            role: req.role,
            expires_at,
        })
        .await?;

    tracing::info!(username = %session.username, role = session.role.as_str(), "session opened");

    Ok(Json(ApiOk {
        data: LoginData {
            access_token,
            expires_at: session.expires_at,
            username: session.username,
            role: session.role,
        },
    }))
}

pub async fn me(auth: AuthContext) -> Json<ApiOk<SessionData>> {
    Json(ApiOk {
        data: SessionData {
            session_id: auth.session_id,
            username: auth.username,
            role: auth.role,
        },
    })
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    if !state.store.revoke_session(auth.session_id).await? {
        return Err(ApiError::session_expired());
    }

    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}
