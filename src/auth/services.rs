//! Account lifecycle: registration, activation, password reset, login and logout.

use tracing::{info, warn};

use super::tokens;
use crate::error::{AppError, AppResult, FieldErrors};
use crate::mail::{send_activation_email, send_password_reset_email};
use crate::state::AppState;
use crate::users::account::DigestKind;
use crate::users::repo::update_with_retry;
use crate::users::repo_types::{AccountState, UserAccount};
use crate::users::validation::{normalize_email, validate_email, validate_name, validate_password};

#[derive(Debug)]
pub struct Registration {
    pub user: UserAccount,
    pub activation_token: String,
}

#[derive(Debug)]
pub enum LoginOutcome {
    /// Credentials accepted on an active account. `remember_token` is set
    /// when remember-me was requested and must go out as a cookie.
    LoggedIn {
        user: UserAccount,
        remember_token: Option<String>,
    },
    Locked(UserAccount),
    /// Not activated yet.
    Forbidden(UserAccount),
    Unauthorized,
}

pub async fn register(
    st: &AppState,
    name: &str,
    email: &str,
    password: &str,
    password_confirmation: &str,
) -> AppResult<Registration> {
    let mut errors = FieldErrors::new();
    validate_name(&mut errors, name);
    validate_email(&mut errors, email);
    validate_password(&mut errors, password, password_confirmation);
    let email = normalize_email(email);
    if errors.get("email").is_none() && st.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        errors.add("email", "has already been taken");
    }
    errors.into_result()?;

    let (user, activation_token) =
        UserAccount::register(&st.hasher, name, &email, password, st.now())?;
    let user = st.users.create(&user).await?;
    send_activation_email(st.mailer.as_ref(), &st.config.mail, &user, &activation_token).await;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Registration {
        user,
        activation_token,
    })
}

/// Activates the account if `token` matches its pending activation. The
/// caller establishes the session.
pub async fn confirm_activation(st: &AppState, email: &str, token: &str) -> AppResult<UserAccount> {
    let user = st
        .users
        .find_by_email(email)
        .await?
        .filter(|u| u.state == AccountState::Inactive)
        .filter(|u| u.authenticated(&st.hasher, DigestKind::Activation, token));
    let Some(user) = user else {
        warn!(email = %email, "activation rejected");
        return Err(AppError::Unauthorized("invalid activation link"));
    };

    let now = st.now();
    let (user, ()) = update_with_retry(st.users.as_ref(), user.id, |u| Ok(u.activate(now)?)).await?;
    info!(user_id = %user.id, "account activated");
    Ok(user)
}

pub async fn request_password_reset(st: &AppState, email: &str) -> AppResult<()> {
    let Some(user) = st.users.find_by_email(email).await? else {
        warn!(email = %email, "password reset for unknown email");
        return Err(AppError::NotFound("email address not found"));
    };

    let now = st.now();
    let hasher = &st.hasher;
    let (user, token) = update_with_retry(st.users.as_ref(), user.id, |u| {
        Ok(u.create_reset_digest(hasher, now)?)
    })
    .await?;
    send_password_reset_email(st.mailer.as_ref(), &st.config.mail, &user, &token).await;

    info!(user_id = %user.id, "password reset requested");
    Ok(())
}

/// Sets a new password through a reset link. The link works once.
pub async fn confirm_password_reset(
    st: &AppState,
    email: &str,
    token: &str,
    password: &str,
    password_confirmation: &str,
) -> AppResult<UserAccount> {
    let user = st
        .users
        .find_by_email(email)
        .await?
        .filter(UserAccount::is_active)
        .filter(|u| u.authenticated(&st.hasher, DigestKind::Reset, token));
    let Some(user) = user else {
        warn!(email = %email, "password reset link rejected");
        return Err(AppError::Unprocessable("invalid password reset link"));
    };

    let now = st.now();
    if user.is_reset_expired(now, st.reset_window()) {
        warn!(user_id = %user.id, "password reset expired");
        return Err(AppError::Expired);
    }
    if password.is_empty() || password_confirmation.is_empty() {
        return Err(AppError::Unprocessable("password can't be blank"));
    }

    let verified_digest = user.reset_digest.clone();
    let hasher = &st.hasher;
    let (user, ()) = update_with_retry(st.users.as_ref(), user.id, |u| {
        // a newer reset request or a completed reset invalidates this link
        if !u.is_active() || u.reset_digest != verified_digest {
            return Err(AppError::Unprocessable("invalid password reset link"));
        }
        u.set_password(hasher, password, password_confirmation, now)?;
        u.clear_reset(now);
        Ok(())
    })
    .await?;

    info!(user_id = %user.id, "password reset completed");
    Ok(user)
}

pub async fn login(
    st: &AppState,
    email: &str,
    password: &str,
    remember_me: bool,
) -> AppResult<LoginOutcome> {
    let Some(user) = st.users.find_by_email(email).await? else {
        warn!(email = %email, "login unknown email");
        return Ok(LoginOutcome::Unauthorized);
    };
    if !user.password_matches(&st.hasher, password) {
        warn!(user_id = %user.id, "login invalid password");
        return Ok(LoginOutcome::Unauthorized);
    }
    match user.state {
        AccountState::Locked => {
            warn!(user_id = %user.id, "login on locked account");
            return Ok(LoginOutcome::Locked(user));
        }
        AccountState::Inactive => {
            warn!(user_id = %user.id, "login on inactive account");
            return Ok(LoginOutcome::Forbidden(user));
        }
        AccountState::Active => {}
    }

    let now = st.now();
    let hasher = &st.hasher;
    let result = if remember_me {
        update_with_retry(st.users.as_ref(), user.id, |u| {
            match u.state {
                AccountState::Active => {}
                AccountState::Locked => return Err(AppError::Locked),
                AccountState::Inactive => return Err(AppError::Forbidden),
            }
            let issued = tokens::issue(hasher)?;
            u.remember(issued.digest, now);
            Ok(Some(issued.token))
        })
        .await
    } else if user.remember_digest.is_some() {
        update_with_retry(st.users.as_ref(), user.id, |u| {
            u.forget(now);
            Ok(None)
        })
        .await
    } else {
        Ok((user.clone(), None))
    };

    match result {
        Ok((user, remember_token)) => {
            info!(user_id = %user.id, remember = remember_token.is_some(), "user logged in");
            Ok(LoginOutcome::LoggedIn { user, remember_token })
        }
        // the account changed state between the password check and the write
        Err(AppError::Locked) => Ok(LoginOutcome::Locked(user)),
        Err(AppError::Forbidden) => Ok(LoginOutcome::Forbidden(user)),
        Err(e) => Err(e),
    }
}

/// Drops the persistent login of `user`, if any.
pub async fn logout(st: &AppState, user: &UserAccount) -> AppResult<()> {
    if user.remember_digest.is_some() {
        let now = st.now();
        match update_with_retry(st.users.as_ref(), user.id, |u| {
            u.forget(now);
            Ok(())
        })
        .await
        {
            // deleted concurrently, nothing left to forget
            Ok(_) | Err(AppError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    info!(user_id = %user.id, "user logged out");
    Ok(())
}
