use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{AccountState, UserAccount};

/// Request body for sign-up.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub password: String,
    pub password_confirmation: String,
}

/// Account as shown to its owner or an admin. Digests never leave the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub admin: bool,
    pub state: AccountState,
    #[serde(with = "time::serde::rfc3339::option")]
    pub activated_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub locked_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&UserAccount> for UserProfile {
    fn from(u: &UserAccount) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            admin: u.admin,
            state: u.state,
            activated_at: u.activated_at,
            locked_at: u.locked_at,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::test_hasher;
    use crate::users::account::tests::account;

    #[test]
    fn profile_serialization_hides_digests() {
        let (user, _) = account(&test_hasher(), AccountState::Active);
        let json = serde_json::to_value(UserProfile::from(&user)).unwrap();
        assert_eq!(json["email"], "michael@example.com");
        assert_eq!(json["state"], "active");
        assert_eq!(json["createdAt"], "2024-03-01T09:00:00Z");
        assert!(json["activatedAt"].is_null());
        let text = json.to_string();
        assert!(!text.contains("digest"));
        assert!(!text.contains("lockVersion"));
    }
}
