use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::models::{CommentId, DbComment, DbPost, PostId, UserId};

/// JSON projection of a post for the `/api` routes.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: UserId,
    pub author: String,
    pub comment_count: i64,
}

/// JSON projection of a comment for the `/api` routes.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
    pub post_id: PostId,
    pub author: String,
}

impl From<DbPost> for PostView {
    fn from(p: DbPost) -> Self {
        Self {
            id: p.id,
            title: p.title,
            content: p.content,
            created_at: p.created_at,
            updated_at: p.updated_at,
            user_id: p.user_id,
            author: p.author,
            comment_count: p.comment_count,
        }
    }
}

impl From<DbComment> for CommentView {
    fn from(c: DbComment) -> Self {
        Self {
            id: c.id,
            content: c.content,
            created_at: c.created_at,
            user_id: c.user_id,
            post_id: c.post_id,
            author: c.author,
        }
    }
}
