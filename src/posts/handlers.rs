use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CreatePostRequest, PostView, UpdatePostRequest};
use super::services;
use crate::auth::session::CurrentUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// --- public feed ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/:id", get(get_post))
}

// --- posts of the logged-in user ---

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/user_posts", get(list_own_posts).post(create_post))
        .route(
            "/user_posts/:id",
            get(get_own_post).put(update_post).delete(delete_post),
        )
}

#[instrument(skip(state))]
pub async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<PostView>>> {
    let posts = state.posts.list_public().await?;
    Ok(Json(posts.into_iter().map(PostView::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PostView>> {
    let post = state
        .posts
        .find_public(id)
        .await?
        .ok_or(AppError::NotFound("post not found"))?;
    Ok(Json(post.into()))
}

#[instrument(skip(state, current))]
pub async fn list_own_posts(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<Vec<PostView>>> {
    let user = current.require_logged_in()?;
    let posts = state.posts.list_by_user(user.id).await?;
    Ok(Json(posts.into_iter().map(PostView::from).collect()))
}

#[instrument(skip(state, current))]
pub async fn get_own_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PostView>> {
    let user = current.require_logged_in()?;
    let post = services::find_own(&state, user.id, id).await?;
    Ok(Json(post.into()))
}

#[instrument(skip(state, current, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<PostView>)> {
    let user = current.require_logged_in()?;
    let post = services::create(&state, user.id, &payload.content, payload.state).await?;

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/user_posts/{}", post.id))
        .map_err(|e| AppError::Internal(e.into()))?;
    headers.insert(header::LOCATION, location);
    Ok((StatusCode::CREATED, headers, Json(PostView::new(post, user.name.clone()))))
}

#[instrument(skip(state, current, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> AppResult<Json<PostView>> {
    let user = current.require_logged_in()?;
    let post =
        services::update(&state, user.id, id, payload.content.as_deref(), payload.state).await?;
    Ok(Json(post.into()))
}

#[instrument(skip(state, current))]
pub async fn delete_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let user = current.require_logged_in()?;
    services::delete(&state, user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
