use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;
use crate::identity::IdentityProvider;
use crate::models::user::{Identity, UserProfile};
use crate::state::AppState;
use crate::store::{StoreError, USERS};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/session", post(sign_in).delete(sign_out))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub user_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: String,
    pub orders: usize,
}

/// Stands in for the identity provider's sign-in callback: reads the
/// profile record and loads the user's orders.
async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let user_id = payload.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::Validation("userId cannot be empty".to_string()));
    }

    let profile = match state.engine.store().backend().get(USERS, user_id).await? {
        Some(record) => serde_json::from_value::<UserProfile>(record)
            .map_err(StoreError::from)?,
        None => UserProfile::default(),
    };

    let identity = Identity {
        id: user_id.to_string(),
        profile,
    };
    state.session.sign_in(identity.clone());
    if let Err(err) = state.engine.on_identity_changed(Some(&identity)).await {
        // Leave nobody signed in rather than the new user over a stale cache.
        state.session.sign_out();
        warn!(user_id = %identity.id, error = %err, "sign-in rolled back: order load failed");
        return Err(err);
    }

    Ok(Json(SessionResponse {
        user_id: identity.id.clone(),
        orders: state.engine.get_user_orders(&identity.id).len(),
    }))
}

async fn sign_out(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    state.session.sign_out();
    state.engine.on_identity_changed(None).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Current signed-in user id or an actionable error.
pub fn require_user(state: &AppState, action: &'static str) -> Result<String, AppError> {
    state
        .session
        .current()
        .map(|identity| identity.id)
        .ok_or(AppError::Unauthenticated(action))
}
