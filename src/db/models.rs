use chrono::{DateTime, Utc};

pub type UserId = i64;
pub type PostId = i64;
pub type CommentId = i64;

/// A registered account. Only the Argon2 PHC string of the password is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct DbUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A post row joined with its author's username and comment count.
#[derive(Debug, Clone, PartialEq)]
pub struct DbPost {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: UserId,
    pub author: String,
    pub comment_count: i64,
}

/// A comment row joined with its author's username.
#[derive(Debug, Clone, PartialEq)]
pub struct DbComment {
    pub id: CommentId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
    pub post_id: PostId,
    pub author: String,
}
