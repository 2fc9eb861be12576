use tracing::info;
use uuid::Uuid;

use super::repo::update_with_retry;
use super::repo_types::UserAccount;
use super::validation::{normalize_email, validate_email, validate_name};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::state::AppState;

pub async fn find(st: &AppState, id: Uuid) -> AppResult<UserAccount> {
    st.users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("user not found"))
}

/// Changes name and/or email. Absent fields stay as they are.
pub async fn update_profile(
    st: &AppState,
    id: Uuid,
    name: Option<&str>,
    email: Option<&str>,
) -> AppResult<UserAccount> {
    let mut errors = FieldErrors::new();
    if let Some(name) = name {
        validate_name(&mut errors, name);
    }
    if let Some(email) = email {
        validate_email(&mut errors, email);
    }
    errors.into_result()?;

    let now = st.now();
    let (user, ()) = update_with_retry(st.users.as_ref(), id, |u| {
        if let Some(name) = name {
            u.name = name.trim().to_string();
        }
        if let Some(email) = email {
            u.email = normalize_email(email);
        }
        u.updated_at = now;
        Ok(())
    })
    .await?;
    info!(user_id = %user.id, "profile updated");
    Ok(user)
}

pub async fn update_password(
    st: &AppState,
    id: Uuid,
    password: &str,
    password_confirmation: &str,
) -> AppResult<UserAccount> {
    let now = st.now();
    let hasher = &st.hasher;
    let (user, ()) = update_with_retry(st.users.as_ref(), id, |u| {
        u.set_password(hasher, password, password_confirmation, now)
    })
    .await?;
    info!(user_id = %user.id, "password changed");
    Ok(user)
}

pub async fn lock(st: &AppState, id: Uuid) -> AppResult<UserAccount> {
    let now = st.now();
    let (user, ()) = update_with_retry(st.users.as_ref(), id, |u| Ok(u.lock(now)?)).await?;
    info!(user_id = %user.id, "account locked");
    Ok(user)
}

pub async fn unlock(st: &AppState, id: Uuid) -> AppResult<UserAccount> {
    let now = st.now();
    let (user, ()) = update_with_retry(st.users.as_ref(), id, |u| Ok(u.unlock(now)?)).await?;
    info!(user_id = %user.id, "account unlocked");
    Ok(user)
}

/// Removes the account; the store drops its posts in the same statement.
pub async fn delete(st: &AppState, id: Uuid) -> AppResult<()> {
    if !st.users.delete(id).await? {
        return Err(AppError::NotFound("user not found"));
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}
