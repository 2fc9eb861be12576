use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::PostStore;
use super::repo_types::{Post, PostState, PostWithAuthor};
use crate::error::StoreError;
use crate::users::memory::InMemoryUserStore;

/// In-memory `PostStore`; author names come from the paired user store.
#[derive(Debug, Clone)]
pub struct InMemoryPostStore {
    posts: Arc<RwLock<HashMap<Uuid, Post>>>,
    users: InMemoryUserStore,
}

impl InMemoryPostStore {
    pub fn new(users: InMemoryUserStore) -> Self {
        Self {
            posts: users.posts_table(),
            users,
        }
    }

    async fn collect<F>(&self, keep: F) -> Vec<PostWithAuthor>
    where
        F: Fn(&Post) -> bool,
    {
        let mut matching: Vec<Post> = self
            .posts
            .read()
            .await
            .values()
            .filter(|p| keep(p))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut out = Vec::with_capacity(matching.len());
        for post in matching {
            // same semantics as the inner join: orphans are skipped
            if let Some(user_name) = self.users.name_of(post.user_id).await {
                out.push(PostWithAuthor { post, user_name });
            }
        }
        out
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn list_public(&self) -> Result<Vec<PostWithAuthor>, StoreError> {
        Ok(self.collect(|p| p.state == PostState::Public).await)
    }

    async fn find_public(&self, id: Uuid) -> Result<Option<PostWithAuthor>, StoreError> {
        Ok(self
            .collect(|p| p.id == id && p.state == PostState::Public)
            .await
            .pop())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<PostWithAuthor>, StoreError> {
        Ok(self.collect(|p| p.user_id == user_id).await)
    }

    async fn find_for_user(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<PostWithAuthor>, StoreError> {
        Ok(self
            .collect(|p| p.id == id && p.user_id == user_id)
            .await
            .pop())
    }

    async fn create(&self, post: &Post) -> Result<Post, StoreError> {
        self.posts.write().await.insert(post.id, post.clone());
        Ok(post.clone())
    }

    async fn update(&self, post: &Post) -> Result<Post, StoreError> {
        let mut posts = self.posts.write().await;
        match posts.get_mut(&post.id) {
            Some(existing) if existing.user_id == post.user_id => {
                existing.content = post.content.clone();
                existing.state = post.state;
                existing.published_at = post.published_at;
                existing.updated_at = post.updated_at;
                Ok(existing.clone())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn delete_for_user(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut posts = self.posts.write().await;
        if posts.get(&id).is_some_and(|p| p.user_id == user_id) {
            posts.remove(&id);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
