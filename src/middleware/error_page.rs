//! Fills in the navigation of error pages for signed-in visitors.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::PrivateCookieJar;
use tracing::debug;

use crate::error::{ErrorPage, error_page};
use crate::middleware::auth::load_session_user;
use crate::router::BlogState;

/// Error pages are rendered without request context. When one comes back and
/// the request carries a live session, render it again with the username so
/// the navigation matches the rest of the site.
pub async fn error_page_chrome(
    State(state): State<BlogState>,
    req: Request,
    next: Next,
) -> Response {
    let jar = PrivateCookieJar::from_headers(req.headers(), state.key());
    let resp = next.run(req).await;
    let Some(page) = resp.extensions().get::<ErrorPage>().cloned() else {
        return resp;
    };
    match load_session_user(&jar, &state).await {
        Ok(Some(user)) => error_page(resp.status(), page.message, Some(user.username)),
        Ok(None) => resp,
        Err(e) => {
            debug!(error = %e, "session lookup failed while rendering error page");
            resp
        }
    }
}
