use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::BlogError;
use crate::handlers::page_chrome;
use crate::middleware::auth::{CurrentUser, end_session, is_safe_next, start_session};
use crate::middleware::flash::{self, FlashCategory, FlashMessage};
use crate::router::BlogState;
use crate::service::password::{hash_password, verify_password};
use crate::templates::{LoginTemplate, RegisterTemplate, render};
use crate::types::forms::{FormErrors, LoginForm, RegistrationForm};

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// GET /register
pub async fn register_page(
    user: Option<CurrentUser>,
    jar: PrivateCookieJar,
) -> Result<Response, BlogError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let (jar, current_user, flashes) = page_chrome(jar, None);
    let page = RegisterTemplate {
        form: RegistrationForm::default(),
        errors: FormErrors::default(),
        current_user,
        flashes,
    };
    Ok((jar, render(&page)?).into_response())
}

/// POST /register -> creates the account and sends the visitor to login.
pub async fn register(
    State(state): State<BlogState>,
    user: Option<CurrentUser>,
    jar: PrivateCookieJar,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, BlogError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let form = form.trimmed();
    let mut errors = FormErrors::check(&form);
    if !errors.has("username") && state.storage.username_exists(&form.username).await? {
        errors.add(
            "username",
            "That username is taken. Please choose a different one.",
        );
    }
    if !errors.has("email") && state.storage.email_exists(&form.email).await? {
        errors.add(
            "email",
            "That email is already registered. Please use a different one.",
        );
    }

    if errors.is_empty() {
        let hash = hash_password(&form.password)?;
        match state
            .storage
            .create_user(&form.username, &form.email, &hash)
            .await
        {
            Ok(user) => {
                info!(user_id = user.id, username = %user.username, "user registered");
                let jar = flash::push(
                    jar,
                    FlashCategory::Success,
                    "Your account has been created! You can now log in.",
                    state.secure_cookies,
                );
                return Ok((jar, Redirect::to("/login")).into_response());
            }
            // lost a race with a concurrent registration
            Err(BlogError::DatabaseError(e))
                if e.as_database_error()
                    .is_some_and(|d| d.is_unique_violation()) =>
            {
                errors.add("username", "That username or email is already registered.");
            }
            Err(e) => return Err(e),
        }
    }

    let (jar, current_user, flashes) = page_chrome(jar, None);
    let page = RegisterTemplate {
        form: RegistrationForm {
            password: String::new(),
            confirm_password: String::new(),
            ..form
        },
        errors,
        current_user,
        flashes,
    };
    Ok((jar, render(&page)?).into_response())
}

/// GET /login
pub async fn login_page(
    Query(query): Query<NextQuery>,
    user: Option<CurrentUser>,
    jar: PrivateCookieJar,
) -> Result<Response, BlogError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let (jar, current_user, flashes) = page_chrome(jar, None);
    let page = LoginTemplate {
        form: LoginForm::default(),
        errors: FormErrors::default(),
        next: query.next,
        current_user,
        flashes,
    };
    Ok((jar, render(&page)?).into_response())
}

/// POST /login -> establishes the session and follows `next` when it is a
/// local path.
pub async fn login(
    State(state): State<BlogState>,
    Query(query): Query<NextQuery>,
    user: Option<CurrentUser>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, BlogError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let form = form.trimmed();
    let errors = FormErrors::check(&form);
    let mut failed = false;

    if errors.is_empty() {
        let account = state.storage.find_user_by_email(&form.email).await?;
        match account {
            Some(account) if verify_password(&form.password, &account.password_hash) => {
                info!(user_id = account.id, "user logged in");
                let jar = start_session(jar, account.id, state.secure_cookies);
                let jar = flash::push(
                    jar,
                    FlashCategory::Success,
                    "You have been logged in successfully!",
                    state.secure_cookies,
                );
                let target = query
                    .next
                    .as_deref()
                    .filter(|n| is_safe_next(n))
                    .unwrap_or("/dashboard");
                return Ok((jar, Redirect::to(target)).into_response());
            }
            _ => {
                warn!("failed login attempt");
                failed = true;
            }
        }
    }

    let (jar, current_user, mut flashes) = page_chrome(jar, None);
    if failed {
        flashes.push(FlashMessage::new(
            FlashCategory::Danger,
            "Login failed. Please check your email and password.",
        ));
    }
    let page = LoginTemplate {
        form: LoginForm {
            password: String::new(),
            ..form
        },
        errors,
        next: query.next,
        current_user,
        flashes,
    };
    Ok((jar, render(&page)?).into_response())
}

/// GET /logout
pub async fn logout(
    State(state): State<BlogState>,
    CurrentUser(user): CurrentUser,
    jar: PrivateCookieJar,
) -> impl IntoResponse {
    info!(user_id = user.id, "user logged out");
    let jar = end_session(jar);
    let jar = flash::push(
        jar,
        FlashCategory::Info,
        "You have been logged out.",
        state.secure_cookies,
    );
    (jar, Redirect::to("/"))
}
