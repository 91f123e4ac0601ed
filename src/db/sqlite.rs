use crate::db::models::{CommentId, DbComment, DbPost, DbUser, PostId, UserId};
use crate::db::schema::SQLITE_INIT;
use crate::error::BlogError;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use tracing::info;

pub type SqlitePool = Pool<Sqlite>;

const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.content, p.created_at, p.updated_at, p.user_id,
           u.username AS author,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.user_id"#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.content, c.created_at, c.user_id, c.post_id,
           u.username AS author
    FROM comments c
    JOIN users u ON u.id = c.user_id"#;

const USER_SELECT: &str =
    "SELECT id, username, email, password_hash, created_at FROM users";

#[derive(Clone)]
pub struct BlogStorage {
    pool: SqlitePool,
}

impl BlogStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` with foreign
    /// keys enforced, and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, BlogError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), BlogError> {
        // sqlx::query runs a single statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        info!("Database tables created or verified");
        Ok(())
    }

    // ---- users ----

    /// Insert a user. A duplicate username or email surfaces as a database
    /// error for which `is_unique_violation` holds.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<DbUser, BlogError> {
        let created_at = now_ts();
        let id = sqlx::query(
            "INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(encode_ts(created_at))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(DbUser {
            id,
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
        })
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<DbUser>, BlogError> {
        let row = sqlx::query(&format!("{USER_SELECT} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Self::row_to_user).transpose()?)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<DbUser>, BlogError> {
        let row = sqlx::query(&format!("{USER_SELECT} WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Self::row_to_user).transpose()?)
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool, BlogError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0 > 0)
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, BlogError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0 > 0)
    }

    // ---- posts ----

    pub async fn create_post(
        &self,
        user_id: UserId,
        title: &str,
        content: &str,
    ) -> Result<DbPost, BlogError> {
        let now = encode_ts(now_ts());
        let id = sqlx::query(
            "INSERT INTO posts (title, content, created_at, updated_at, user_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(title)
        .bind(content)
        .bind(&now)
        .bind(&now)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get_post(id).await?.ok_or(BlogError::NotFound("Post"))
    }

    pub async fn get_post(&self, id: PostId) -> Result<Option<DbPost>, BlogError> {
        let row = sqlx::query(&format!("{POST_SELECT} WHERE p.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Self::row_to_post).transpose()?)
    }

    pub async fn count_posts(&self) -> Result<i64, BlogError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0)
    }

    /// One window of posts, newest first.
    pub async fn list_posts(&self, limit: i64, offset: i64) -> Result<Vec<DbPost>, BlogError> {
        let rows = sqlx::query(&format!(
            "{POST_SELECT} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| Self::row_to_post(r).map_err(Into::into))
            .collect()
    }

    pub async fn list_all_posts(&self) -> Result<Vec<DbPost>, BlogError> {
        let rows = sqlx::query(&format!(
            "{POST_SELECT} ORDER BY p.created_at DESC, p.id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| Self::row_to_post(r).map_err(Into::into))
            .collect()
    }

    pub async fn list_posts_by_user(&self, user_id: UserId) -> Result<Vec<DbPost>, BlogError> {
        let rows = sqlx::query(&format!(
            "{POST_SELECT} WHERE p.user_id = ? ORDER BY p.created_at DESC, p.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| Self::row_to_post(r).map_err(Into::into))
            .collect()
    }

    /// Replace title and content and bump `updated_at`.
    pub async fn update_post(
        &self,
        id: PostId,
        title: &str,
        content: &str,
    ) -> Result<(), BlogError> {
        sqlx::query("UPDATE posts SET title = ?, content = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(content)
            .bind(encode_ts(now_ts()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a post; its comments go with it through `ON DELETE CASCADE`.
    /// Returns whether a row was removed.
    pub async fn delete_post(&self, id: PostId) -> Result<bool, BlogError> {
        let res = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // ---- comments ----

    pub async fn create_comment(
        &self,
        user_id: UserId,
        post_id: PostId,
        content: &str,
    ) -> Result<DbComment, BlogError> {
        let id = sqlx::query(
            "INSERT INTO comments (content, created_at, user_id, post_id) VALUES (?, ?, ?, ?)",
        )
        .bind(content)
        .bind(encode_ts(now_ts()))
        .bind(user_id)
        .bind(post_id)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get_comment(id)
            .await?
            .ok_or(BlogError::NotFound("Comment"))
    }

    pub async fn get_comment(&self, id: CommentId) -> Result<Option<DbComment>, BlogError> {
        let row = sqlx::query(&format!("{COMMENT_SELECT} WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Self::row_to_comment).transpose()?)
    }

    /// Comments of one post, newest first.
    pub async fn list_comments_for_post(
        &self,
        post_id: PostId,
    ) -> Result<Vec<DbComment>, BlogError> {
        let rows = sqlx::query(&format!(
            "{COMMENT_SELECT} WHERE c.post_id = ? ORDER BY c.created_at DESC, c.id DESC"
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| Self::row_to_comment(r).map_err(Into::into))
            .collect()
    }

    pub async fn delete_comment(&self, id: CommentId) -> Result<bool, BlogError> {
        let res = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    fn row_to_user(row: SqliteRow) -> Result<DbUser, sqlx::Error> {
        let created_at: String = row.try_get("created_at")?;
        Ok(DbUser {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: decode_ts(&created_at)?,
        })
    }

    fn row_to_post(row: SqliteRow) -> Result<DbPost, sqlx::Error> {
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;
        Ok(DbPost {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            created_at: decode_ts(&created_at)?,
            updated_at: decode_ts(&updated_at)?,
            user_id: row.try_get("user_id")?,
            author: row.try_get("author")?,
            comment_count: row.try_get("comment_count")?,
        })
    }

    fn row_to_comment(row: SqliteRow) -> Result<DbComment, sqlx::Error> {
        let created_at: String = row.try_get("created_at")?;
        Ok(DbComment {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
            created_at: decode_ts(&created_at)?,
            user_id: row.try_get("user_id")?,
            post_id: row.try_get("post_id")?,
            author: row.try_get("author")?,
        })
    }
}

/// Current time at the precision the database keeps.
fn now_ts() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(s: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}
