pub mod auth;
pub mod comments;
pub mod posts;

use axum_extra::extract::cookie::PrivateCookieJar;

use crate::middleware::auth::CurrentUser;
use crate::middleware::flash::{self, FlashMessage};

/// Pending flash messages plus the username for the navigation bar.
pub(crate) fn page_chrome(
    jar: PrivateCookieJar,
    user: Option<&CurrentUser>,
) -> (PrivateCookieJar, Option<String>, Vec<FlashMessage>) {
    let (jar, flashes) = flash::take(jar);
    let username = user.map(|CurrentUser(u)| u.username.clone());
    (jar, username, flashes)
}
