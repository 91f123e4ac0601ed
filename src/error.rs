use askama::Template;
use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

use crate::templates::ErrorTemplate;

#[derive(Debug, ThisError)]
pub enum BlogError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("Template error: {0}")]
    TemplateError(#[from] askama::Error),
}

impl BlogError {
    pub fn status(&self) -> StatusCode {
        match self {
            BlogError::NotFound(_) => StatusCode::NOT_FOUND,
            BlogError::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client. Internal failures are logged here
    /// and replaced by a generic text.
    fn public_message(&self) -> String {
        match self {
            BlogError::NotFound(_) => "Page not found".to_string(),
            BlogError::Forbidden(msg) => msg.clone(),
            other => {
                error!(error = %other, "Server error");
                "Server error".to_string()
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            BlogError::NotFound(_) => "NOT_FOUND",
            BlogError::Forbidden(_) => "FORBIDDEN",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Left on rendered error pages so the navigation can be filled in once the
/// session is known; see `middleware::error_page`.
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub message: String,
}

/// Render the error page for `status`.
pub fn error_page(status: StatusCode, message: String, current_user: Option<String>) -> Response {
    let page = ErrorTemplate {
        error_code: status.as_u16(),
        message,
        current_user,
        flashes: Vec::new(),
    };
    match page.render() {
        Ok(body) => (status, Html(body)).into_response(),
        Err(e) => {
            error!(error = %e, "failed to render error page");
            (status, page.message).into_response()
        }
    }
}

/// HTML routes: render the dedicated error page.
impl IntoResponse for BlogError {
    fn into_response(self) -> Response {
        let message = self.public_message();
        let mut resp = error_page(self.status(), message.clone(), None);
        resp.extensions_mut().insert(ErrorPage { message });
        resp
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// Error for the read-only `/api` routes, rendered as structured JSON.
#[derive(Debug)]
pub struct ApiError(pub BlogError);

impl From<BlogError> for ApiError {
    fn from(e: BlogError) -> Self {
        Self(e)
    }
}

impl From<SqlxError> for ApiError {
    fn from(e: SqlxError) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let body = ApiErrorBody {
            code: self.0.code().to_string(),
            message: self.0.public_message(),
        };
        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// JSON body returned by the delete endpoints, on success and failure alike.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Error for mutating endpoints called from scripts; answers with
/// `{"success": false, "message": ...}`.
#[derive(Debug)]
pub struct ActionError(pub BlogError);

impl From<BlogError> for ActionError {
    fn from(e: BlogError) -> Self {
        Self(e)
    }
}

impl From<SqlxError> for ActionError {
    fn from(e: SqlxError) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let message = match &self.0 {
            BlogError::NotFound(what) => format!("{what} not found"),
            other => other.public_message(),
        };
        (
            status,
            Json(ActionResponse {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}
