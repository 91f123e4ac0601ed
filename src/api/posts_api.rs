//! Read-only JSON views of posts and comments.

use axum::{Json, extract::State};

use crate::error::{ApiError, BlogError};
use crate::middleware::path::IdPath;
use crate::router::BlogState;
use crate::types::views::{CommentView, PostView};

/// GET /api/posts -> every post, newest first.
pub async fn list_posts(State(state): State<BlogState>) -> Result<Json<Vec<PostView>>, ApiError> {
    let posts = state.storage.list_all_posts().await?;
    Ok(Json(posts.into_iter().map(PostView::from).collect()))
}

/// GET /api/posts/{id}
pub async fn get_post(
    State(state): State<BlogState>,
    IdPath(post_id, ..): IdPath<ApiError>,
) -> Result<Json<PostView>, ApiError> {
    let post = state
        .storage
        .get_post(post_id)
        .await?
        .ok_or(BlogError::NotFound("Post"))?;
    Ok(Json(post.into()))
}

/// GET /api/posts/{id}/comments -> 404 when the post itself is missing.
pub async fn list_post_comments(
    State(state): State<BlogState>,
    IdPath(post_id, ..): IdPath<ApiError>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    if state.storage.get_post(post_id).await?.is_none() {
        return Err(BlogError::NotFound("Post").into());
    }
    let comments = state.storage.list_comments_for_post(post_id).await?;
    Ok(Json(comments.into_iter().map(CommentView::from).collect()))
}
