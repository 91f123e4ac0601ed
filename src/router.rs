use axum::{
    Router,
    extract::FromRef,
    middleware,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use tower_http::trace::TraceLayer;

use crate::api::posts_api;
use crate::db::BlogStorage;
use crate::error::BlogError;
use crate::handlers::{auth, comments, posts};
use crate::middleware::error_page::error_page_chrome;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct BlogState {
    pub storage: BlogStorage,
    pub secure_cookies: bool,
    key: Key,
}

impl BlogState {
    /// The cookie key is the SHA-512 digest of `session_secret`, which gives
    /// the 64 bytes of key material `Key` needs from a secret of any length.
    pub fn new(storage: BlogStorage, session_secret: &str, secure_cookies: bool) -> Self {
        let digest = Sha512::digest(session_secret.as_bytes());
        Self {
            storage,
            secure_cookies,
            key: Key::from(digest.as_slice()),
        }
    }

    pub fn key(&self) -> Key {
        self.key.clone()
    }
}

impl FromRef<BlogState> for Key {
    fn from_ref(state: &BlogState) -> Self {
        state.key()
    }
}

pub fn blog_router(state: BlogState) -> Router {
    Router::new()
        .route("/", get(posts::index))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/dashboard", get(posts::dashboard))
        .route("/post/new", get(posts::new_post_page).post(posts::create_post))
        .route("/post/{post_id}", get(posts::post_detail))
        .route(
            "/post/{post_id}/edit",
            get(posts::edit_post_page).post(posts::edit_post),
        )
        .route("/post/{post_id}/delete", post(posts::delete_post))
        .route("/post/{post_id}/comment", post(comments::add_comment))
        .route("/comment/{comment_id}/delete", post(comments::delete_comment))
        .route("/api/posts", get(posts_api::list_posts))
        .route("/api/posts/{post_id}", get(posts_api::get_post))
        .route(
            "/api/posts/{post_id}/comments",
            get(posts_api::list_post_comments),
        )
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error_page_chrome,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> BlogError {
    BlogError::NotFound("Page")
}
