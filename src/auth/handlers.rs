use axum::{
    extract::{FromRef, Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Value};
use tracing::instrument;

use super::dto::{ActivationRequest, LoginRequest, ResetConfirmRequest, ResetRequest};
use super::jwt::JwtKeys;
use super::services::{self, LoginOutcome};
use super::session::{self, CurrentUser};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::dto::UserProfile;

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", delete(logout))
        .route("/client_user", get(client_user))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/account_activations/:token", put(activate))
        .route("/password_resets", post(request_reset))
        .route("/password_resets/:token", put(confirm_reset))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<UserProfile>)> {
    match services::login(&state, &payload.email, &payload.password, payload.remember_me).await? {
        LoginOutcome::LoggedIn { user, remember_token } => {
            let keys = JwtKeys::from_ref(&state);
            let jar = session::log_in(jar, &keys, user.id)?;
            let jar = match remember_token {
                Some(token) => session::remember(jar, &keys, user.id, token)?,
                None => session::forget(jar),
            };
            Ok((jar, Json(UserProfile::from(&user))))
        }
        LoginOutcome::Locked(_) => Err(AppError::Locked),
        LoginOutcome::Forbidden(_) => Err(AppError::Forbidden),
        LoginOutcome::Unauthorized => {
            Err(AppError::Unauthorized("invalid email/password combination"))
        }
    }
}

#[instrument(skip(state, current, jar))]
pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<Value>)> {
    if let Some(user) = current.0.user() {
        services::logout(&state, user).await?;
    }
    Ok((session::log_out(jar), Json(json!({}))))
}

#[instrument(skip(current))]
pub async fn client_user(current: CurrentUser) -> AppResult<Json<UserProfile>> {
    let user = current.require_logged_in()?;
    Ok(Json(UserProfile::from(user)))
}

#[instrument(skip(state, jar, token, payload))]
pub async fn activate(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(token): Path<String>,
    Json(payload): Json<ActivationRequest>,
) -> AppResult<(CookieJar, Json<UserProfile>)> {
    let user = services::confirm_activation(&state, &payload.email, &token).await?;
    let jar = session::log_in(jar, &JwtKeys::from_ref(&state), user.id)?;
    Ok((jar, Json(UserProfile::from(&user))))
}

#[instrument(skip(state, payload))]
pub async fn request_reset(
    State(state): State<AppState>,
    Json(payload): Json<ResetRequest>,
) -> AppResult<Json<Value>> {
    services::request_password_reset(&state, &payload.email).await?;
    Ok(Json(json!({})))
}

#[instrument(skip(state, token, payload))]
pub async fn confirm_reset(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetConfirmRequest>,
) -> AppResult<Json<Value>> {
    services::confirm_password_reset(
        &state,
        &payload.email,
        &token,
        &payload.password,
        &payload.password_confirmation,
    )
    .await?;
    Ok(Json(json!({})))
}
