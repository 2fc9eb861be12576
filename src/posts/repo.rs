use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::posts::repo_types::{Post, PostState, PostWithAuthor};

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Public posts, newest first.
    async fn list_public(&self) -> Result<Vec<PostWithAuthor>, StoreError>;
    async fn find_public(&self, id: Uuid) -> Result<Option<PostWithAuthor>, StoreError>;
    /// All posts of one user, newest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<PostWithAuthor>, StoreError>;
    async fn find_for_user(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<PostWithAuthor>, StoreError>;
    async fn create(&self, post: &Post) -> Result<Post, StoreError>;
    /// Updates content/state of a post owned by `post.user_id`.
    async fn update(&self, post: &Post) -> Result<Post, StoreError>;
    async fn delete_for_user(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError>;
}

const POST_SELECT: &str = r#"
    SELECT p.id, p.user_id, p.content, p.state, p.published_at, p.created_at, p.updated_at,
           u.name AS user_name
      FROM posts p
      JOIN users u ON u.id = p.user_id
"#;

#[derive(Debug, Clone)]
pub struct PgPostStore {
    db: PgPool,
}

impl PgPostStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn list_public(&self) -> Result<Vec<PostWithAuthor>, StoreError> {
        let rows = sqlx::query_as::<_, PostWithAuthor>(&format!(
            "{POST_SELECT} WHERE p.state = $1 ORDER BY p.created_at DESC"
        ))
        .bind(PostState::Public)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_public(&self, id: Uuid) -> Result<Option<PostWithAuthor>, StoreError> {
        let row = sqlx::query_as::<_, PostWithAuthor>(&format!(
            "{POST_SELECT} WHERE p.id = $1 AND p.state = $2"
        ))
        .bind(id)
        .bind(PostState::Public)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<PostWithAuthor>, StoreError> {
        let rows = sqlx::query_as::<_, PostWithAuthor>(&format!(
            "{POST_SELECT} WHERE p.user_id = $1 ORDER BY p.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_for_user(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<PostWithAuthor>, StoreError> {
        let row = sqlx::query_as::<_, PostWithAuthor>(&format!(
            "{POST_SELECT} WHERE p.id = $1 AND p.user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create(&self, post: &Post) -> Result<Post, StoreError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, user_id, content, state, published_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, content, state, published_at, created_at, updated_at
            "#,
        )
        .bind(post.id)
        .bind(post.user_id)
        .bind(&post.content)
        .bind(post.state)
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(&self.db)
        .await?;
        Ok(post)
    }

    async fn update(&self, post: &Post) -> Result<Post, StoreError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
               SET content = $3, state = $4, published_at = $5, updated_at = $6
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, content, state, published_at, created_at, updated_at
            "#,
        )
        .bind(post.id)
        .bind(post.user_id)
        .bind(&post.content)
        .bind(post.state)
        .bind(post.published_at)
        .bind(post.updated_at)
        .fetch_optional(&self.db)
        .await?;
        post.ok_or(StoreError::NotFound)
    }

    async fn delete_for_user(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
