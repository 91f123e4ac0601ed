//! One-shot messages carried across a redirect in an encrypted cookie.

use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::Duration;
use tracing::debug;

pub const FLASH_COOKIE: &str = "blog_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Info,
    Warning,
    Danger,
}

impl FlashCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

impl fmt::Display for FlashCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub category: FlashCategory,
    pub message: String,
}

impl FlashMessage {
    pub fn new(category: FlashCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Queue a message for the next rendered page.
pub fn push(
    jar: PrivateCookieJar,
    category: FlashCategory,
    message: impl Into<String>,
    secure: bool,
) -> PrivateCookieJar {
    let mut pending = peek(&jar);
    pending.push(FlashMessage::new(category, message));
    match serde_json::to_string(&pending) {
        Ok(value) => jar.add(build_cookie(value, secure)),
        Err(e) => {
            debug!(error = %e, "dropping flash message");
            jar
        }
    }
}

/// Drain queued messages; the cookie is cleared when anything was queued.
pub fn take(jar: PrivateCookieJar) -> (PrivateCookieJar, Vec<FlashMessage>) {
    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, Vec::new());
    }
    let pending = peek(&jar);
    (jar.remove(clear_cookie()), pending)
}

fn peek(jar: &PrivateCookieJar) -> Vec<FlashMessage> {
    jar.get(FLASH_COOKIE)
        .and_then(|c| serde_json::from_str(c.value()).ok())
        .unwrap_or_default()
}

fn build_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(FLASH_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(5))
        .build()
}

fn clear_cookie() -> Cookie<'static> {
    Cookie::build(Cookie::new(FLASH_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
