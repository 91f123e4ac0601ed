use axum::extract::{FromRef, FromRequestParts, OptionalFromRequestParts};
use axum::http::Uri;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use tracing::debug;

use crate::db::models::{DbUser, UserId};
use crate::error::BlogError;
use crate::middleware::flash::{self, FlashCategory};
use crate::router::BlogState;

pub const SESSION_COOKIE: &str = "blog_session";

/// Bind the session to `user_id`.
pub fn start_session(jar: PrivateCookieJar, user_id: UserId, secure: bool) -> PrivateCookieJar {
    jar.add(
        Cookie::build(Cookie::new(SESSION_COOKIE, user_id.to_string()))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .build(),
    )
}

pub fn end_session(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(
        Cookie::build(Cookie::new(SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build(),
    )
}

pub fn session_user_id(jar: &PrivateCookieJar) -> Option<UserId> {
    jar.get(SESSION_COOKIE)
        .and_then(|c| c.value().parse::<UserId>().ok())
}

/// Only local absolute paths are followed after login. Browsers drop tabs and
/// newlines from URLs, so control characters are refused before the path is
/// parsed.
pub fn is_safe_next(next: &str) -> bool {
    if !next.starts_with('/')
        || next.starts_with("//")
        || next.contains('\\')
        || next.chars().any(char::is_control)
    {
        return false;
    }
    match next.parse::<Uri>() {
        Ok(uri) => uri.scheme().is_none() && uri.authority().is_none(),
        Err(_) => false,
    }
}

/// Resolve the session cookie to a live user. A cookie naming a user that no
/// longer exists counts as logged out.
pub async fn load_session_user(
    jar: &PrivateCookieJar,
    state: &BlogState,
) -> Result<Option<DbUser>, BlogError> {
    let Some(user_id) = session_user_id(jar) else {
        return Ok(None);
    };
    let user = state.storage.get_user(user_id).await?;
    if user.is_none() {
        debug!(user_id, "session refers to a missing user");
    }
    Ok(user)
}

/// Redirect to the login page, remembering where the visitor was headed.
fn login_redirect(parts: &Parts, jar: PrivateCookieJar, secure: bool) -> Response {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let next: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    let jar = flash::push(
        jar,
        FlashCategory::Info,
        "Please log in to access this page.",
        secure,
    );
    (jar, Redirect::to(&format!("/login?next={next}"))).into_response()
}

/// The authenticated user of the request. Used as an extractor it is the
/// login-required guard: anonymous visitors are redirected to `/login`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub DbUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    BlogState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = BlogState::from_ref(state);
        let jar = PrivateCookieJar::from_headers(&parts.headers, state.key());
        match load_session_user(&jar, &state).await {
            Ok(Some(user)) => Ok(Self(user)),
            Ok(None) => Err(login_redirect(parts, jar, state.secure_cookies)),
            Err(e) => Err(e.into_response()),
        }
    }
}

impl<S> OptionalFromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    BlogState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let state = BlogState::from_ref(state);
        let jar = PrivateCookieJar::from_headers(&parts.headers, state.key());
        load_session_user(&jar, &state)
            .await
            .map(|user| user.map(Self))
            .map_err(IntoResponse::into_response)
    }
}
