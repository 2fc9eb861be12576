use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult, StoreError};
use crate::users::repo_types::UserAccount;

/// Persistence for accounts. `update` is a compare-and-set on `lock_version`:
/// it fails with [`StoreError::Stale`] when the row changed since it was read.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, StoreError>;
    /// Case-insensitive.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError>;
    async fn list(&self) -> Result<Vec<UserAccount>, StoreError>;
    async fn create(&self, user: &UserAccount) -> Result<UserAccount, StoreError>;
    async fn update(&self, user: &UserAccount) -> Result<UserAccount, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

const MAX_ATTEMPTS: usize = 3;

/// Read-modify-write of one account. `apply` runs against a freshly loaded
/// row and is re-run on a stale write, so its preconditions are always
/// checked against current state.
pub async fn update_with_retry<T, F>(
    store: &dyn UserStore,
    id: Uuid,
    mut apply: F,
) -> AppResult<(UserAccount, T)>
where
    F: FnMut(&mut UserAccount) -> AppResult<T>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let mut user = store
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("user not found"))?;
        let out = apply(&mut user)?;
        match store.update(&user).await {
            Ok(saved) => return Ok((saved, out)),
            Err(StoreError::Stale) => {
                tracing::debug!(user_id = %id, attempt, "stale account write, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(StoreError::Stale.into())
}

const USER_COLUMNS: &str = "id, name, email, password_digest, admin, state, activation_digest, \
     remember_digest, reset_digest, reset_sent_at, activated_at, locked_at, created_at, \
     updated_at, lock_version";

#[derive(Debug, Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, StoreError> {
        let user = sqlx::query_as::<_, UserAccount>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let user = sqlx::query_as::<_, UserAccount>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = lower($1)"
        ))
        .bind(email.trim())
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<UserAccount>, StoreError> {
        let users = sqlx::query_as::<_, UserAccount>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn create(&self, user: &UserAccount) -> Result<UserAccount, StoreError> {
        let user = sqlx::query_as::<_, UserAccount>(&format!(
            r#"
            INSERT INTO users (id, name, email, password_digest, admin, state, activation_digest,
                               remember_digest, reset_digest, reset_sent_at, activated_at,
                               locked_at, created_at, updated_at, lock_version)
            VALUES ($1, $2, lower($3), $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 0)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_digest)
        .bind(user.admin)
        .bind(user.state)
        .bind(&user.activation_digest)
        .bind(&user.remember_digest)
        .bind(&user.reset_digest)
        .bind(user.reset_sent_at)
        .bind(user.activated_at)
        .bind(user.locked_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, user: &UserAccount) -> Result<UserAccount, StoreError> {
        let updated = sqlx::query_as::<_, UserAccount>(&format!(
            r#"
            UPDATE users
               SET name = $2, email = lower($3), password_digest = $4, admin = $5, state = $6,
                   activation_digest = $7, remember_digest = $8, reset_digest = $9,
                   reset_sent_at = $10, activated_at = $11, locked_at = $12, updated_at = $13,
                   lock_version = lock_version + 1
             WHERE id = $1 AND lock_version = $14
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_digest)
        .bind(user.admin)
        .bind(user.state)
        .bind(&user.activation_digest)
        .bind(&user.remember_digest)
        .bind(&user.reset_digest)
        .bind(user.reset_sent_at)
        .bind(user.activated_at)
        .bind(user.locked_at)
        .bind(user.updated_at)
        .bind(user.lock_version)
        .fetch_optional(&self.db)
        .await?;

        match updated {
            Some(u) => Ok(u),
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                        .bind(user.id)
                        .fetch_one(&self.db)
                        .await?;
                Err(if exists {
                    StoreError::Stale
                } else {
                    StoreError::NotFound
                })
            }
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        // posts go with the user through ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

