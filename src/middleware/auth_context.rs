use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::hash_access_token;
use crate::error::ApiError;
use crate::models::{AppState, Role};

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub session_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Extract Authorization: Bearer <token>
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_access_token(authz.token());

            let session = state
                .store
                .find_active_session(&token_hash)
                .await?
                .ok_or_else(ApiError::session_expired)?;

            // Touch last_seen_at (best-effort)
            if let Err(e) = state.store.touch_session(session.session_id).await {
                tracing::debug!(error = %e, "failed to touch session");
            }

            Ok(AuthContext {
                session_id: session.session_id,
                username: session.username,
                role: session.role,
            })
        }
    }
}
