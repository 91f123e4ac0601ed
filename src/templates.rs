//! Askama templates for the HTML pages.

use askama::Template;
use axum::response::Html;
use chrono::{DateTime, Utc};

use crate::db::models::{DbComment, DbPost};
use crate::error::BlogError;
use crate::middleware::flash::FlashMessage;
use crate::types::forms::{CommentForm, FormErrors, LoginForm, PostForm, RegistrationForm};
use crate::types::page::Pagination;

/// Human-readable timestamp, e.g. `May 01, 2024 at 12:30 PM`.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%B %d, %Y at %I:%M %p").to_string()
}

mod filters {
    use chrono::{DateTime, Utc};
    use std::borrow::Borrow;

    pub fn format_datetime<T: Borrow<DateTime<Utc>>>(dt: T) -> ::askama::Result<String> {
        Ok(super::format_datetime(dt.borrow()))
    }
}

pub fn render<T: Template>(page: &T) -> Result<Html<String>, BlogError> {
    Ok(Html(page.render()?))
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub error_code: u16,
    pub message: String,
    pub current_user: Option<String>,
    pub flashes: Vec<FlashMessage>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub posts: Vec<DbPost>,
    pub pagination: Pagination,
    pub current_user: Option<String>,
    pub flashes: Vec<FlashMessage>,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub form: RegistrationForm,
    pub errors: FormErrors,
    pub current_user: Option<String>,
    pub flashes: Vec<FlashMessage>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub form: LoginForm,
    pub errors: FormErrors,
    /// Post-login destination, echoed into the form action.
    pub next: Option<String>,
    pub current_user: Option<String>,
    pub flashes: Vec<FlashMessage>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub posts: Vec<DbPost>,
    pub current_user: Option<String>,
    pub flashes: Vec<FlashMessage>,
}

/// Shared by the create and edit pages.
#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub heading: String,
    pub action: String,
    pub form: PostForm,
    pub errors: FormErrors,
    pub current_user: Option<String>,
    pub flashes: Vec<FlashMessage>,
}

pub struct CommentRow {
    pub comment: DbComment,
    pub can_delete: bool,
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub post: DbPost,
    pub comments: Vec<CommentRow>,
    pub form: CommentForm,
    pub can_modify: bool,
    pub current_user: Option<String>,
    pub flashes: Vec<FlashMessage>,
}
