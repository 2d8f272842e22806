//! Strict JSON body extraction.
//!
//! Wraps `axum::Json` so body rejections (malformed JSON, unknown fields,
//! trailing data, oversized bodies) surface through the standard error
//! envelope as `invalid_request` instead of axum's plain-text rejections.

use crate::api::error::ApiError;
use crate::error::PlannerError;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

pub struct StrictJson<T>(pub T);

impl<S, T> FromRequest<S> for StrictJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(StrictJson(value)),
            Err(rejection) => Err(ApiError(PlannerError::invalid_request(
                rejection.body_text(),
            ))),
        }
    }
}
