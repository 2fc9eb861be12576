//! Request identity: resolution from cookies, memoized per request.
//!
//! A `session` cookie carries a short-lived signed marker. The remember-me
//! pair is a signed long-lived `user_id` cookie plus a `remember_token` cookie
//! whose digest lives on the account. When only the pair is present and it
//! checks out, the session marker is re-issued on the way out.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::jwt::{JwtKeys, TokenKind};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::account::DigestKind;
use crate::users::repo_types::UserAccount;

pub const SESSION_COOKIE: &str = "session";
pub const USER_ID_COOKIE: &str = "user_id";
pub const REMEMBER_COOKIE: &str = "remember_token";

#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    User(UserAccount),
}

impl Identity {
    pub fn user(&self) -> Option<&UserAccount> {
        match self {
            Identity::User(u) => Some(u),
            Identity::Anonymous => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub identity: Identity,
    /// Resolved through the remember-me pair, so the session marker needs re-issuing.
    pub refreshed: bool,
}

impl Resolution {
    fn anonymous() -> Self {
        Self {
            identity: Identity::Anonymous,
            refreshed: false,
        }
    }

    fn active(user: Option<UserAccount>, refreshed: bool) -> Self {
        match user.filter(UserAccount::is_active) {
            Some(u) => Self {
                identity: Identity::User(u),
                refreshed,
            },
            None => Self::anonymous(),
        }
    }
}

/// Resolves the identity carried by `jar`. Failures of the remember-me pair
/// all look the same to the caller.
pub async fn resolve(state: &AppState, jar: &CookieJar) -> AppResult<Resolution> {
    let keys = JwtKeys::from_ref(state);

    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match keys.verify(cookie.value(), TokenKind::Session) {
            Ok(claims) => {
                let user = state.users.find_by_id(claims.sub).await?;
                return Ok(Resolution::active(user, false));
            }
            Err(e) => debug!(error = %e, "ignoring invalid session cookie"),
        }
    }

    let pair = (jar.get(USER_ID_COOKIE), jar.get(REMEMBER_COOKIE));
    let (Some(id_cookie), Some(token_cookie)) = pair else {
        return Ok(Resolution::anonymous());
    };
    let Ok(claims) = keys.verify(id_cookie.value(), TokenKind::Remember) else {
        debug!("remember cookie rejected");
        return Ok(Resolution::anonymous());
    };
    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .filter(|u| u.authenticated(&state.hasher, DigestKind::Remember, token_cookie.value()));
    match user {
        Some(u) if u.is_active() => {
            info!(user_id = %u.id, "session restored from remember cookie");
            Ok(Resolution::active(Some(u), true))
        }
        _ => {
            debug!("remember cookie rejected");
            Ok(Resolution::anonymous())
        }
    }
}

/// Request-scoped memo of the resolved identity.
#[derive(Debug, Clone, Default)]
pub struct RequestSession(Arc<OnceCell<Resolution>>);

impl RequestSession {
    /// Runs resolution on first use; later calls reuse the result.
    pub async fn identity(&self, state: &AppState, jar: &CookieJar) -> AppResult<Identity> {
        let resolution = self.0.get_or_try_init(|| resolve(state, jar)).await?;
        Ok(resolution.identity.clone())
    }

    pub fn refreshed_user(&self) -> Option<Uuid> {
        match self.0.get() {
            Some(Resolution {
                identity: Identity::User(u),
                refreshed: true,
            }) => Some(u.id),
            _ => None,
        }
    }
}

/// The identity of the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = match parts.extensions.get::<RequestSession>() {
            Some(s) => s.clone(),
            None => {
                let s = RequestSession::default();
                parts.extensions.insert(s.clone());
                s
            }
        };
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(CurrentUser(session.identity(state, &jar).await?))
    }
}

/// Installs a [`RequestSession`] and re-issues the session marker when the
/// request was authenticated by the remember-me pair.
pub async fn track_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let session = RequestSession::default();
    req.extensions_mut().insert(session.clone());
    let res = next.run(req).await;

    let Some(user_id) = session.refreshed_user() else {
        return res;
    };
    // the handler already wrote session cookies (login, logout, ...)
    let handled = res
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| {
            [SESSION_COOKIE, USER_ID_COOKIE, REMEMBER_COOKIE]
                .iter()
                .any(|name| v.starts_with(&format!("{name}=")))
        });
    if handled {
        return res;
    }
    let keys = JwtKeys::from_ref(&state);
    match log_in(CookieJar::new(), &keys, user_id) {
        Ok(jar) => (jar, res).into_response(),
        Err(e) => {
            warn!(error = %e, user_id = %user_id, "could not refresh session cookie");
            res
        }
    }
}

fn cookie(keys: &JwtKeys, name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(keys.secure_cookies)
        .build()
}

fn long_lived(
    keys: &JwtKeys,
    name: &'static str,
    value: String,
    max_age: time::Duration,
) -> Cookie<'static> {
    let mut c = cookie(keys, name, value);
    c.set_max_age(max_age);
    c
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

/// Sets the session marker for `user_id`.
pub fn log_in(jar: CookieJar, keys: &JwtKeys, user_id: Uuid) -> anyhow::Result<CookieJar> {
    let token = keys.sign(user_id, TokenKind::Session)?;
    Ok(jar.add(cookie(keys, SESSION_COOKIE, token)))
}

/// Sets the long-lived remember-me pair.
pub fn remember(
    jar: CookieJar,
    keys: &JwtKeys,
    user_id: Uuid,
    remember_token: String,
) -> anyhow::Result<CookieJar> {
    let signed_id = keys.sign(user_id, TokenKind::Remember)?;
    let max_age = time::Duration::try_from(keys.remember_ttl)?;
    Ok(jar
        .add(long_lived(keys, USER_ID_COOKIE, signed_id, max_age))
        .add(long_lived(keys, REMEMBER_COOKIE, remember_token, max_age)))
}

pub fn forget(jar: CookieJar) -> CookieJar {
    jar.remove(removal(USER_ID_COOKIE))
        .remove(removal(REMEMBER_COOKIE))
}

pub fn log_out(jar: CookieJar) -> CookieJar {
    forget(jar).remove(removal(SESSION_COOKIE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens;
    use crate::state::fake::Fake;
    use crate::users::account::tests::account;
    use crate::users::repo_types::AccountState;
    use axum::http::{header::COOKIE, HeaderMap, HeaderValue};

    async fn stored_user(fake: &Fake, state: AccountState) -> UserAccount {
        let (user, _) = account(&fake.state.hasher, state);
        fake.state.users.create(&user).await.unwrap()
    }

    fn jar_with(cookies: &[(&str, String)]) -> CookieJar {
        let header = cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&header).unwrap());
        CookieJar::from_headers(&headers)
    }

    async fn remembered(fake: &Fake, user: &UserAccount) -> String {
        let issued = tokens::issue(&fake.state.hasher).unwrap();
        let mut u = user.clone();
        u.remember(issued.digest, fake.state.now());
        fake.state.users.update(&u).await.unwrap();
        issued.token
    }

    #[tokio::test]
    async fn no_cookies_is_anonymous() {
        let fake = AppState::fake();
        let r = resolve(&fake.state, &CookieJar::new()).await.unwrap();
        assert!(r.identity.user().is_none());
        assert!(!r.refreshed);
    }

    #[tokio::test]
    async fn session_marker_is_trusted() {
        let fake = AppState::fake();
        let user = stored_user(&fake, AccountState::Active).await;
        let keys = JwtKeys::from_ref(&fake.state);
        let jar = jar_with(&[(SESSION_COOKIE, keys.sign(user.id, TokenKind::Session).unwrap())]);

        let r = resolve(&fake.state, &jar).await.unwrap();
        assert_eq!(r.identity.user().map(|u| u.id), Some(user.id));
        assert!(!r.refreshed);
    }

    #[tokio::test]
    async fn remember_pair_resolves_and_refreshes() {
        let fake = AppState::fake();
        let user = stored_user(&fake, AccountState::Active).await;
        let token = remembered(&fake, &user).await;
        let keys = JwtKeys::from_ref(&fake.state);
        let jar = jar_with(&[
            (USER_ID_COOKIE, keys.sign(user.id, TokenKind::Remember).unwrap()),
            (REMEMBER_COOKIE, token),
        ]);

        let r = resolve(&fake.state, &jar).await.unwrap();
        assert_eq!(r.identity.user().map(|u| u.id), Some(user.id));
        assert!(r.refreshed);
    }

    #[tokio::test]
    async fn wrong_remember_token_is_anonymous() {
        let fake = AppState::fake();
        let user = stored_user(&fake, AccountState::Active).await;
        remembered(&fake, &user).await;
        let keys = JwtKeys::from_ref(&fake.state);
        let jar = jar_with(&[
            (USER_ID_COOKIE, keys.sign(user.id, TokenKind::Remember).unwrap()),
            (REMEMBER_COOKIE, tokens::new_token()),
        ]);
        assert!(resolve(&fake.state, &jar).await.unwrap().identity.user().is_none());
    }

    #[tokio::test]
    async fn unsigned_user_id_cookie_is_anonymous() {
        let fake = AppState::fake();
        let user = stored_user(&fake, AccountState::Active).await;
        let token = remembered(&fake, &user).await;
        let jar = jar_with(&[(USER_ID_COOKIE, user.id.to_string()), (REMEMBER_COOKIE, token)]);
        assert!(resolve(&fake.state, &jar).await.unwrap().identity.user().is_none());
    }

    #[tokio::test]
    async fn session_marker_of_locked_user_is_anonymous() {
        let fake = AppState::fake();
        let user = stored_user(&fake, AccountState::Locked).await;
        let keys = JwtKeys::from_ref(&fake.state);
        let jar = jar_with(&[(SESSION_COOKIE, keys.sign(user.id, TokenKind::Session).unwrap())]);
        assert!(resolve(&fake.state, &jar).await.unwrap().identity.user().is_none());
    }

    #[tokio::test]
    async fn session_marker_cannot_stand_in_for_remember_cookie() {
        let fake = AppState::fake();
        let user = stored_user(&fake, AccountState::Active).await;
        let token = remembered(&fake, &user).await;
        let keys = JwtKeys::from_ref(&fake.state);
        let jar = jar_with(&[
            (USER_ID_COOKIE, keys.sign(user.id, TokenKind::Session).unwrap()),
            (REMEMBER_COOKIE, token),
        ]);
        assert!(resolve(&fake.state, &jar).await.unwrap().identity.user().is_none());
    }

    #[tokio::test]
    async fn resolution_is_memoized_per_request() {
        let fake = AppState::fake();
        let user = stored_user(&fake, AccountState::Active).await;
        let keys = JwtKeys::from_ref(&fake.state);
        let jar = jar_with(&[(SESSION_COOKIE, keys.sign(user.id, TokenKind::Session).unwrap())]);

        let session = RequestSession::default();
        let first = session.identity(&fake.state, &jar).await.unwrap();
        assert!(first.user().is_some());

        // a second lookup within the same request does not hit the store again
        fake.state.users.delete(user.id).await.unwrap();
        let second = session.identity(&fake.state, &jar).await.unwrap();
        assert_eq!(second.user().map(|u| u.id), Some(user.id));

        // a new request sees the deletion
        let fresh = RequestSession::default();
        assert!(fresh.identity(&fake.state, &jar).await.unwrap().user().is_none());
    }

    #[tokio::test]
    async fn only_the_remember_pair_outlives_the_browser() {
        let fake = AppState::fake();
        let keys = JwtKeys::from_ref(&fake.state);
        let user_id = Uuid::new_v4();
        let jar = log_in(CookieJar::new(), &keys, user_id).unwrap();
        let jar = remember(jar, &keys, user_id, "token".into()).unwrap();

        let session = jar.get(SESSION_COOKIE).unwrap();
        assert_eq!(session.max_age(), None);
        let expected = time::Duration::try_from(keys.remember_ttl).unwrap();
        for name in [SESSION_COOKIE, USER_ID_COOKIE, REMEMBER_COOKIE] {
            let c = jar.get(name).unwrap();
            assert_eq!(c.http_only(), Some(true), "{name}");
            assert_eq!(c.same_site(), Some(SameSite::Lax), "{name}");
            assert_eq!(c.path(), Some("/"), "{name}");
            if name != SESSION_COOKIE {
                assert_eq!(c.max_age(), Some(expected), "{name}");
            }
        }
    }

    #[test]
    fn log_out_removes_all_cookies_it_received() {
        let jar = jar_with(&[
            (SESSION_COOKIE, "a".into()),
            (USER_ID_COOKIE, "b".into()),
            (REMEMBER_COOKIE, "c".into()),
        ]);
        let jar = log_out(jar);
        assert!(jar.get(SESSION_COOKIE).is_none());
        assert!(jar.get(USER_ID_COOKIE).is_none());
        assert!(jar.get(REMEMBER_COOKIE).is_none());
    }
}
