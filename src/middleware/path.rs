use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use axum::response::IntoResponse;
use std::marker::PhantomData;

use crate::error::BlogError;

/// Numeric id taken from the single path parameter of a route. Anything that
/// is not an integer is treated as an unknown route and rejected as `E`, so
/// JSON routes can answer with their own error body.
#[derive(Debug)]
pub struct IdPath<E = BlogError>(pub i64, pub PhantomData<E>);

fn parse_id(raw: &str) -> Result<i64, BlogError> {
    raw.parse::<i64>().map_err(|_| BlogError::NotFound("Page"))
}

impl<S, E> FromRequestParts<S> for IdPath<E>
where
    S: Send + Sync,
    E: From<BlogError> + IntoResponse + Send,
{
    type Rejection = E;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| E::from(BlogError::NotFound("Page")))?;
        let id = parse_id(&raw).map_err(E::from)?;
        Ok(Self(id, PhantomData))
    }
}
