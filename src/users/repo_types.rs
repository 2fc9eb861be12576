use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle state of an account, stored as an integer tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum AccountState {
    Inactive = 0,
    Active = 1,
    Locked = 2,
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccountState::Inactive => "inactive",
            AccountState::Active => "active",
            AccountState::Locked => "locked",
        })
    }
}

/// User record in the database.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,                      // always lower-cased
    pub password_digest: String,            // Argon2 PHC string
    pub admin: bool,
    pub state: AccountState,
    pub activation_digest: Option<String>,
    pub remember_digest: Option<String>,
    pub reset_digest: Option<String>,
    pub reset_sent_at: Option<OffsetDateTime>,
    pub activated_at: Option<OffsetDateTime>,
    pub locked_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub lock_version: i32,                  // optimistic concurrency guard
}
