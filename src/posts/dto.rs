use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Post, PostState, PostWithAuthor};

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    #[serde(default)]
    pub state: PostState,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub content: Option<String>,
    pub state: Option<PostState>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub content: String,
    pub state: PostState,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PostView {
    pub fn new(post: Post, user_name: String) -> Self {
        Self {
            id: post.id,
            user_id: post.user_id,
            user_name,
            content: post.content,
            state: post.state,
            published_at: post.published_at,
            updated_at: post.updated_at,
        }
    }
}

impl From<PostWithAuthor> for PostView {
    fn from(p: PostWithAuthor) -> Self {
        Self::new(p.post, p.user_name)
    }
}
