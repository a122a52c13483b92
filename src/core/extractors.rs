//! Axum extractors for query strings, JSON bodies and document ids
//!
//! All of them reject with [`AppError`] so malformed input produces the
//! same JSON error envelope as every other failure. The query and body
//! extractors drop keys that start with `$` or contain `.` before the
//! handler sees them.

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::entity::sanitize;
use crate::core::error::{AppError, RequestError, ValidationError};
use crate::core::query::QueryParams;

/// Grouped query-string parameters of a list request
#[derive(Debug, Clone, Default)]
pub struct ApiQuery(pub QueryParams);

impl<S: Send + Sync> FromRequestParts<S> for ApiQuery {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri).map_err(
            |rejection| ValidationError::InvalidQuery {
                message: rejection.body_text(),
            },
        )?;
        Ok(ApiQuery(QueryParams::from_pairs(pairs)?))
    }
}

/// Id of the addressed document: the last path parameter, so
/// `/tours/{tourId}/reviews/{id}` yields the review id
#[derive(Debug, Clone)]
pub struct TargetId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for TargetId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(mut params) = Path::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| RequestError::Rejected {
                status: rejection.status(),
                message: rejection.body_text(),
            })?;

        params
            .pop()
            .map(|(_, id)| TargetId(id))
            .ok_or_else(|| AppError::bad_request("Missing document id in path"))
    }
}

/// Sanitized JSON request body
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| RequestError::Rejected {
                status: rejection.status(),
                message: rejection.body_text(),
            })?;

        let value = serde_json::from_value(sanitize(value))?;
        Ok(JsonBody(value))
    }
}
