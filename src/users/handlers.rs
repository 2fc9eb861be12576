use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, put},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;
use uuid::Uuid;

use super::dto::{RegisterRequest, UpdatePasswordRequest, UpdateUserRequest, UserProfile};
use super::services;
use crate::auth::{self, session::CurrentUser};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(show_user).put(update_user).delete(destroy_user))
        .route("/users/:id/lock", put(lock_user))
        .route("/users/:id/unlock", put(unlock_user))
        .route("/users/:id/update_password", put(update_password))
}

#[instrument(skip(state, current))]
pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<Vec<UserProfile>>> {
    current.require_admin()?;
    let users = state.users.list().await?;
    Ok(Json(users.iter().map(UserProfile::from).collect()))
}

/// Sign-up. The account starts inactive and an activation mail goes out.
#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<UserProfile>)> {
    let reg = auth::services::register(
        &state,
        &payload.name,
        &payload.email,
        &payload.password,
        &payload.password_confirmation,
    )
    .await?;

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/users/{}", reg.user.id))
        .map_err(|e| AppError::Internal(e.into()))?;
    headers.insert(header::LOCATION, location);
    Ok((StatusCode::CREATED, headers, Json(UserProfile::from(&reg.user))))
}

#[instrument(skip(state, current))]
pub async fn show_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserProfile>> {
    current.require_self_or_admin(id)?;
    let user = services::find(&state, id).await?;
    Ok(Json(UserProfile::from(&user)))
}

#[instrument(skip(state, current, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<UserProfile>> {
    current.require_self_or_admin(id)?;
    let user =
        services::update_profile(&state, id, payload.name.as_deref(), payload.email.as_deref())
            .await?;
    Ok(Json(UserProfile::from(&user)))
}

#[instrument(skip(state, current, jar))]
pub async fn destroy_user(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> AppResult<(CookieJar, StatusCode)> {
    let actor = current.require_self_or_admin(id)?;
    let deleting_self = actor.id == id;
    services::delete(&state, id).await?;
    let jar = if deleting_self { auth::session::log_out(jar) } else { jar };
    Ok((jar, StatusCode::NO_CONTENT))
}

#[instrument(skip(state, current))]
pub async fn lock_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserProfile>> {
    current.require_admin()?;
    let user = services::lock(&state, id).await?;
    Ok(Json(UserProfile::from(&user)))
}

#[instrument(skip(state, current))]
pub async fn unlock_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserProfile>> {
    current.require_admin()?;
    let user = services::unlock(&state, id).await?;
    Ok(Json(UserProfile::from(&user)))
}

#[instrument(skip(state, current, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> AppResult<Json<UserProfile>> {
    current.require_self_or_admin(id)?;
    let user =
        services::update_password(&state, id, &payload.password, &payload.password_confirmation)
            .await?;
    Ok(Json(UserProfile::from(&user)))
}
