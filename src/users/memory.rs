//! In-memory `UserStore`, used by tests and the fake application state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::UserStore;
use super::repo_types::UserAccount;
use crate::error::StoreError;
use crate::posts::repo_types::Post;

/// Holds the posts table too, so deleting a user cascades like the foreign key does.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, UserAccount>>>,
    posts: Arc<RwLock<HashMap<Uuid, Post>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name lookup used by the in-memory post store.
    pub async fn name_of(&self, id: Uuid) -> Option<String> {
        self.users.read().await.get(&id).map(|u| u.name.clone())
    }

    /// Posts table shared with `InMemoryPostStore`.
    pub(crate) fn posts_table(&self) -> Arc<RwLock<HashMap<Uuid, Post>>> {
        Arc::clone(&self.posts)
    }
}

fn email_taken(users: &HashMap<Uuid, UserAccount>, email: &str, except: Uuid) -> bool {
    users
        .values()
        .any(|u| u.id != except && u.email.eq_ignore_ascii_case(email))
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let email = email.trim().to_lowercase();
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<UserAccount>, StoreError> {
        let mut users: Vec<UserAccount> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn create(&self, user: &UserAccount) -> Result<UserAccount, StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(StoreError::Other(anyhow::anyhow!("user {} already exists", user.id)));
        }
        if email_taken(&users, &user.email, user.id) {
            return Err(StoreError::DuplicateEmail);
        }
        let mut stored = user.clone();
        stored.email = stored.email.to_lowercase();
        stored.lock_version = 0;
        users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, user: &UserAccount) -> Result<UserAccount, StoreError> {
        let mut users = self.users.write().await;
        let current = users.get(&user.id).ok_or(StoreError::NotFound)?;
        if current.lock_version != user.lock_version {
            return Err(StoreError::Stale);
        }
        if email_taken(&users, &user.email, user.id) {
            return Err(StoreError::DuplicateEmail);
        }
        let mut stored = user.clone();
        stored.email = stored.email.to_lowercase();
        stored.lock_version += 1;
        users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        if users.remove(&id).is_none() {
            return Ok(false);
        }
        self.posts.write().await.retain(|_, p| p.user_id != id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::test_hasher;
    use crate::error::AppError;
    use crate::posts::repo_types::PostState;
    use crate::users::account::tests::{account, T0};
    use crate::users::repo::update_with_retry;
    use crate::users::repo_types::AccountState;

    #[tokio::test]
    async fn email_lookup_is_case_insensitive() {
        let store = InMemoryUserStore::new();
        let (user, _) = account(&test_hasher(), AccountState::Active);
        store.create(&user).await.unwrap();

        let found = store.find_by_email("MICHAEL@example.COM").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = InMemoryUserStore::new();
        let hasher = test_hasher();
        let (a, _) = account(&hasher, AccountState::Active);
        let (mut b, _) = account(&hasher, AccountState::Active);
        b.email = "MICHAEL@EXAMPLE.COM".into();
        store.create(&a).await.unwrap();
        assert!(matches!(store.create(&b).await, Err(StoreError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn stale_write_is_refused() {
        let store = InMemoryUserStore::new();
        let (user, _) = account(&test_hasher(), AccountState::Active);
        let stored = store.create(&user).await.unwrap();

        let mut first = stored.clone();
        let mut second = stored.clone();
        first.lock(T0).unwrap();
        second.name = "Renamed".into();

        let saved = store.update(&first).await.unwrap();
        assert_eq!(saved.lock_version, 1);
        assert!(matches!(store.update(&second).await, Err(StoreError::Stale)));
    }

    #[tokio::test]
    async fn retry_reapplies_against_fresh_state() {
        let store = InMemoryUserStore::new();
        let (user, _) = account(&test_hasher(), AccountState::Active);
        let stored = store.create(&user).await.unwrap();

        // someone else locks the account first
        let mut locked = stored.clone();
        locked.lock(T0).unwrap();
        store.update(&locked).await.unwrap();

        let result = update_with_retry(&store, stored.id, |u| {
            u.lock(T0)?;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AppError::Transition(_))));

        let (saved, ()) = update_with_retry(&store, stored.id, |u| {
            u.unlock(T0)?;
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(saved.state, AccountState::Active);
        assert_eq!(saved.lock_version, 2);
    }

    #[tokio::test]
    async fn delete_cascades_to_posts() {
        let store = InMemoryUserStore::new();
        let hasher = test_hasher();
        let (gone, _) = account(&hasher, AccountState::Active);
        let (mut kept, _) = account(&hasher, AccountState::Active);
        kept.email = "kept@example.com".into();
        store.create(&gone).await.unwrap();
        store.create(&kept).await.unwrap();
        {
            let mut posts = store.posts.write().await;
            for post in [
                Post::new(gone.id, "bye", PostState::Public, T0),
                Post::new(kept.id, "hi", PostState::Public, T0),
            ] {
                posts.insert(post.id, post);
            }
        }

        assert!(store.delete(gone.id).await.unwrap());
        let owners: Vec<Uuid> = store.posts.read().await.values().map(|p| p.user_id).collect();
        assert_eq!(owners, vec![kept.id]);
        assert!(!store.delete(gone.id).await.unwrap());
    }

    #[tokio::test]
    async fn retry_on_missing_user_is_not_found() {
        let store = InMemoryUserStore::new();
        let result = update_with_retry(&store, Uuid::new_v4(), |_| Ok(())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
