use tracing::{info, warn};
use uuid::Uuid;

use super::repo_types::{Post, PostState, PostWithAuthor};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::state::AppState;

pub const CONTENT_MAX: usize = 1000;

fn validate_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::Validation(FieldErrors::single("content", "can't be blank")));
    }
    if content.chars().count() > CONTENT_MAX {
        return Err(AppError::Validation(FieldErrors::single(
            "content",
            format!("is too long (maximum is {CONTENT_MAX} characters)"),
        )));
    }
    Ok(())
}

/// `ban` is set by moderation only; owners can neither enter nor leave it.
fn check_owner_state(current: Option<PostState>, requested: PostState) -> AppResult<()> {
    if requested == PostState::Ban {
        return Err(AppError::Validation(FieldErrors::single("state", "is not allowed")));
    }
    if current == Some(PostState::Ban) {
        return Err(AppError::Validation(FieldErrors::single(
            "state",
            "can't change a banned post",
        )));
    }
    Ok(())
}

pub async fn find_own(st: &AppState, user_id: Uuid, id: Uuid) -> AppResult<PostWithAuthor> {
    st.posts
        .find_for_user(user_id, id)
        .await?
        .ok_or(AppError::NotFound("post not found"))
}

pub async fn create(
    st: &AppState,
    user_id: Uuid,
    content: &str,
    state: PostState,
) -> AppResult<Post> {
    validate_content(content)?;
    check_owner_state(None, state)?;
    let post = st.posts.create(&Post::new(user_id, content, state, st.now())).await?;
    info!(post_id = %post.id, user_id = %user_id, state = ?post.state, "post created");
    Ok(post)
}

/// Edits a post of `user_id`. Posts of other users look missing.
pub async fn update(
    st: &AppState,
    user_id: Uuid,
    id: Uuid,
    content: Option<&str>,
    state: Option<PostState>,
) -> AppResult<PostWithAuthor> {
    let PostWithAuthor { mut post, user_name } = find_own(st, user_id, id).await?;
    if let Some(content) = content {
        validate_content(content)?;
        post.content = content.to_string();
    }
    if let Some(requested) = state {
        if let Err(e) = check_owner_state(Some(post.state), requested) {
            warn!(
                post_id = %post.id,
                user_id = %user_id,
                from = ?post.state,
                to = ?requested,
                "post state change refused"
            );
            return Err(e);
        }
    }
    let now = st.now();
    match state {
        Some(state) => post.set_state(state, now),
        None => post.updated_at = now,
    }
    let post = st.posts.update(&post).await?;
    info!(post_id = %post.id, user_id = %user_id, "post updated");
    Ok(PostWithAuthor { post, user_name })
}

pub async fn delete(st: &AppState, user_id: Uuid, id: Uuid) -> AppResult<()> {
    if !st.posts.delete_for_user(user_id, id).await? {
        return Err(AppError::NotFound("post not found"));
    }
    info!(post_id = %id, user_id = %user_id, "post deleted");
    Ok(())
}
