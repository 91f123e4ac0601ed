//! Input schemas for the HTML forms and their field-level error messages.

use serde::Deserialize;
use std::collections::BTreeMap;
use validator::{Validate, ValidationErrors};

#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct RegistrationForm {
    #[validate(length(
        min = 2,
        max = 20,
        message = "Username must be between 2 and 20 characters."
    ))]
    pub username: String,
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords must match."))]
    pub confirm_password: String,
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct LoginForm {
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct PostForm {
    #[validate(length(min = 1, max = 100, message = "Title must be between 1 and 100 characters."))]
    pub title: String,
    #[validate(length(min = 1, message = "Content is required."))]
    pub content: String,
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct CommentForm {
    #[validate(length(min = 1, message = "Comment cannot be empty."))]
    pub content: String,
}

impl RegistrationForm {
    /// Strip surrounding whitespace from the identity fields. Passwords are
    /// taken verbatim.
    pub fn trimmed(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_string();
        self
    }
}

impl LoginForm {
    pub fn trimmed(mut self) -> Self {
        self.email = self.email.trim().to_string();
        self
    }
}

impl PostForm {
    /// Whitespace-only titles or bodies count as empty.
    pub fn trimmed(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.content = self.content.trim().to_string();
        self
    }
}

impl CommentForm {
    pub fn trimmed(mut self) -> Self {
        self.content = self.content.trim().to_string();
        self
    }
}

/// Messages keyed by form field, shown next to the offending input.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    /// Run the declarative rules of `form`.
    pub fn check<T: Validate>(form: &T) -> Self {
        match form.validate() {
            Ok(()) => Self::default(),
            Err(errors) => Self::from_validation(&errors),
        }
    }

    pub fn from_validation(errors: &ValidationErrors) -> Self {
        let mut out = Self::default();
        for (field, errs) in errors.field_errors() {
            for err in errs.iter() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                out.add(&field.to_string(), message);
            }
        }
        out
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First message of any field, for places that show a single line.
    pub fn first(&self) -> Option<&str> {
        self.0.values().flatten().next().map(String::as_str)
    }
}
