use axum::{
    Form, Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::POSTS_PER_PAGE;
use crate::db::models::DbPost;
use crate::error::{ActionError, ActionResponse, BlogError};
use crate::handlers::page_chrome;
use crate::middleware::auth::CurrentUser;
use crate::middleware::flash::{self, FlashCategory};
use crate::middleware::path::IdPath;
use crate::router::BlogState;
use crate::service::authz::{can_delete_comment, can_modify_post};
use crate::templates::{
    CommentRow, DashboardTemplate, IndexTemplate, PostDetailTemplate, PostFormTemplate, render,
};
use crate::types::forms::{CommentForm, FormErrors, PostForm};
use crate::types::page::Pagination;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// GET / -> newest posts, five per page.
pub async fn index(
    State(state): State<BlogState>,
    Query(query): Query<PageQuery>,
    user: Option<CurrentUser>,
    jar: PrivateCookieJar,
) -> Result<Response, BlogError> {
    let page = Pagination::parse_page(query.page.as_deref());
    let total = state.storage.count_posts().await?;
    let pagination =
        Pagination::new(page, POSTS_PER_PAGE, total).ok_or(BlogError::NotFound("Page"))?;
    let posts = state
        .storage
        .list_posts(pagination.per_page, pagination.offset())
        .await?;

    let (jar, current_user, flashes) = page_chrome(jar, user.as_ref());
    let page = IndexTemplate {
        posts,
        pagination,
        current_user,
        flashes,
    };
    Ok((jar, render(&page)?).into_response())
}

/// GET /dashboard -> the acting user's own posts.
pub async fn dashboard(
    State(state): State<BlogState>,
    user: CurrentUser,
    jar: PrivateCookieJar,
) -> Result<Response, BlogError> {
    let posts = state.storage.list_posts_by_user(user.0.id).await?;
    let (jar, current_user, flashes) = page_chrome(jar, Some(&user));
    let page = DashboardTemplate {
        posts,
        current_user,
        flashes,
    };
    Ok((jar, render(&page)?).into_response())
}

fn post_form_page(
    jar: PrivateCookieJar,
    user: &CurrentUser,
    heading: &str,
    action: String,
    form: PostForm,
    errors: FormErrors,
) -> Result<Response, BlogError> {
    let (jar, current_user, flashes) = page_chrome(jar, Some(user));
    let page = PostFormTemplate {
        heading: heading.to_string(),
        action,
        form,
        errors,
        current_user,
        flashes,
    };
    Ok((jar, render(&page)?).into_response())
}

/// GET /post/new
pub async fn new_post_page(user: CurrentUser, jar: PrivateCookieJar) -> Result<Response, BlogError> {
    post_form_page(
        jar,
        &user,
        "New Post",
        "/post/new".to_string(),
        PostForm::default(),
        FormErrors::default(),
    )
}

/// POST /post/new
pub async fn create_post(
    State(state): State<BlogState>,
    user: CurrentUser,
    jar: PrivateCookieJar,
    Form(form): Form<PostForm>,
) -> Result<Response, BlogError> {
    let form = form.trimmed();
    let errors = FormErrors::check(&form);
    if !errors.is_empty() {
        return post_form_page(jar, &user, "New Post", "/post/new".to_string(), form, errors);
    }

    let post = state
        .storage
        .create_post(user.0.id, &form.title, &form.content)
        .await?;
    info!(post_id = post.id, user_id = user.0.id, "post created");
    let jar = flash::push(
        jar,
        FlashCategory::Success,
        "Your post has been created!",
        state.secure_cookies,
    );
    Ok((jar, Redirect::to("/dashboard")).into_response())
}

/// GET /post/{id} -> the post with its comments, newest first.
pub async fn post_detail(
    State(state): State<BlogState>,
    IdPath(post_id, ..): IdPath,
    user: Option<CurrentUser>,
    jar: PrivateCookieJar,
) -> Result<Response, BlogError> {
    let post = load_post(&state, post_id).await?;
    let comments = state.storage.list_comments_for_post(post_id).await?;

    let viewer = user.as_ref().map(|CurrentUser(u)| u);
    let comments = comments
        .into_iter()
        .map(|comment| CommentRow {
            can_delete: viewer.is_some_and(|u| can_delete_comment(u, &comment, &post)),
            comment,
        })
        .collect();
    let can_modify = viewer.is_some_and(|u| can_modify_post(u, &post));

    let (jar, current_user, flashes) = page_chrome(jar, user.as_ref());
    let page = PostDetailTemplate {
        post,
        comments,
        form: CommentForm::default(),
        can_modify,
        current_user,
        flashes,
    };
    Ok((jar, render(&page)?).into_response())
}

/// Redirect a non-owner back to the post with an explanation.
fn reject_edit(state: &BlogState, jar: PrivateCookieJar, user: &CurrentUser, post: &DbPost) -> Response {
    warn!(post_id = post.id, user_id = user.0.id, "edit rejected: not the owner");
    let jar = flash::push(
        jar,
        FlashCategory::Danger,
        "You cannot edit a post that is not yours.",
        state.secure_cookies,
    );
    (jar, Redirect::to(&format!("/post/{}", post.id))).into_response()
}

/// GET /post/{id}/edit
pub async fn edit_post_page(
    State(state): State<BlogState>,
    IdPath(post_id, ..): IdPath,
    user: CurrentUser,
    jar: PrivateCookieJar,
) -> Result<Response, BlogError> {
    let post = load_post(&state, post_id).await?;
    if !can_modify_post(&user.0, &post) {
        return Ok(reject_edit(&state, jar, &user, &post));
    }
    let form = PostForm {
        title: post.title,
        content: post.content,
    };
    post_form_page(
        jar,
        &user,
        "Edit Post",
        format!("/post/{post_id}/edit"),
        form,
        FormErrors::default(),
    )
}

/// POST /post/{id}/edit -> ownership is checked before the input is looked at.
pub async fn edit_post(
    State(state): State<BlogState>,
    IdPath(post_id, ..): IdPath,
    user: CurrentUser,
    jar: PrivateCookieJar,
    Form(form): Form<PostForm>,
) -> Result<Response, BlogError> {
    let post = load_post(&state, post_id).await?;
    if !can_modify_post(&user.0, &post) {
        return Ok(reject_edit(&state, jar, &user, &post));
    }

    let form = form.trimmed();
    let errors = FormErrors::check(&form);
    if !errors.is_empty() {
        return post_form_page(
            jar,
            &user,
            "Edit Post",
            format!("/post/{post_id}/edit"),
            form,
            errors,
        );
    }

    state
        .storage
        .update_post(post_id, &form.title, &form.content)
        .await?;
    info!(post_id, user_id = user.0.id, "post updated");
    let jar = flash::push(
        jar,
        FlashCategory::Success,
        "Your post has been updated!",
        state.secure_cookies,
    );
    Ok((jar, Redirect::to(&format!("/post/{post_id}"))).into_response())
}

/// POST /post/{id}/delete -> JSON result; comments are removed with the post.
pub async fn delete_post(
    State(state): State<BlogState>,
    IdPath(post_id, ..): IdPath<ActionError>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ActionResponse>, ActionError> {
    let post = state
        .storage
        .get_post(post_id)
        .await?
        .ok_or(BlogError::NotFound("Post"))?;

    if !can_modify_post(&user, &post) {
        warn!(post_id, user_id = user.id, "delete rejected: not the owner");
        return Err(BlogError::Forbidden("You cannot delete a post that is not yours".to_string()).into());
    }

    state.storage.delete_post(post_id).await?;
    info!(post_id, user_id = user.id, "post deleted");
    Ok(Json(ActionResponse::ok("Post deleted successfully")))
}

async fn load_post(state: &BlogState, post_id: i64) -> Result<DbPost, BlogError> {
    state
        .storage
        .get_post(post_id)
        .await?
        .ok_or(BlogError::NotFound("Post"))
}
