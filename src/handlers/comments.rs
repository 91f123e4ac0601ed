use axum::{
    Form, Json,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use tracing::{info, warn};

use crate::error::{ActionError, ActionResponse, BlogError};
use crate::middleware::auth::CurrentUser;
use crate::middleware::flash::{self, FlashCategory};
use crate::middleware::path::IdPath;
use crate::router::BlogState;
use crate::service::authz::can_delete_comment;
use crate::types::forms::{CommentForm, FormErrors};

/// POST /post/{id}/comment -> always lands back on the post page.
pub async fn add_comment(
    State(state): State<BlogState>,
    IdPath(post_id, ..): IdPath,
    CurrentUser(user): CurrentUser,
    jar: PrivateCookieJar,
    Form(form): Form<CommentForm>,
) -> Result<Response, BlogError> {
    if state.storage.get_post(post_id).await?.is_none() {
        return Err(BlogError::NotFound("Post"));
    }

    let back = format!("/post/{post_id}");
    let form = form.trimmed();
    let errors = FormErrors::check(&form);
    if let Some(message) = errors.first() {
        let jar = flash::push(jar, FlashCategory::Danger, message, state.secure_cookies);
        return Ok((jar, Redirect::to(&back)).into_response());
    }

    let comment = state
        .storage
        .create_comment(user.id, post_id, &form.content)
        .await?;
    info!(comment_id = comment.id, post_id, user_id = user.id, "comment added");
    let jar = flash::push(
        jar,
        FlashCategory::Success,
        "Your comment has been added!",
        state.secure_cookies,
    );
    Ok((jar, Redirect::to(&back)).into_response())
}

/// POST /comment/{id}/delete -> allowed for the comment author and the post owner.
pub async fn delete_comment(
    State(state): State<BlogState>,
    IdPath(comment_id, ..): IdPath<ActionError>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ActionResponse>, ActionError> {
    let comment = state
        .storage
        .get_comment(comment_id)
        .await?
        .ok_or(BlogError::NotFound("Comment"))?;
    let post = state
        .storage
        .get_post(comment.post_id)
        .await?
        .ok_or(BlogError::NotFound("Post"))?;

    if !can_delete_comment(&user, &comment, &post) {
        warn!(comment_id, user_id = user.id, "comment delete rejected");
        return Err(BlogError::Forbidden("You cannot delete this comment".to_string()).into());
    }

    state.storage.delete_comment(comment_id).await?;
    info!(comment_id, user_id = user.id, "comment deleted");
    Ok(Json(ActionResponse::ok("Comment deleted successfully")))
}
