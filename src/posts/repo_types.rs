use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Visibility of a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum PostState {
    Private = 0,
    #[default]
    Public = 1,
    Ban = 2,
}

/// Post record in the database.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,                          // owner, never changes
    pub content: String,
    pub state: PostState,
    pub published_at: Option<OffsetDateTime>,   // first time it went public
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A post joined with its author's display name.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PostWithAuthor {
    #[sqlx(flatten)]
    pub post: Post,
    pub user_name: String,
}

impl Post {
    pub fn new(user_id: Uuid, content: &str, state: PostState, now: OffsetDateTime) -> Self {
        let mut post = Self {
            id: Uuid::new_v4(),
            user_id,
            content: content.to_string(),
            state: PostState::Private,
            published_at: None,
            created_at: now,
            updated_at: now,
        };
        post.set_state(state, now);
        post
    }

    pub fn set_state(&mut self, state: PostState, now: OffsetDateTime) {
        self.state = state;
        if state == PostState::Public && self.published_at.is_none() {
            self.published_at = Some(now);
        }
        self.updated_at = now;
    }
}
