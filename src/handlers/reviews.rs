//! Review endpoints, top-level and nested under a tour

use super::factory::{self, document_envelope};
use crate::auth::middleware::{CUSTOMER, CUSTOMER_OR_ADMIN};
use crate::auth::{CurrentUser, protected, restricted};
use crate::core::entity::{Entity, parse_id};
use crate::core::error::{AppError, AppResult, RequestError};
use crate::core::extractors::JsonBody;
use crate::core::query::Condition;
use crate::entities::Review;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{MethodRouter, get, patch, post};
use axum::{Json, Router};
use serde_json::Value;
use std::collections::HashMap;

/// `GET` and `POST` on a review collection
fn collection_routes(state: &AppState) -> MethodRouter<AppState> {
    protected(state, get(factory::list::<Review>))
        .merge(restricted(state, CUSTOMER, post(create_review)))
}

/// Review routes; mounted at `/reviews` and `/tours/{tourId}/reviews`
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new().route("/", collection_routes(state)).route(
        "/{id}",
        protected(state, get(factory::get_one::<Review>)).merge(restricted(
            state,
            CUSTOMER_OR_ADMIN,
            patch(factory::update_one::<Review>).delete(factory::delete_one::<Review>),
        )),
    )
}

/// Create a review written by the caller.
///
/// The author is always the caller; the tour comes from the body or, when
/// nested, from the route. Only customers who booked the tour may review it,
/// once.
pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    path: Option<Path<HashMap<String, String>>>,
    JsonBody(mut payload): JsonBody<Value>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let fields = payload.as_object_mut().ok_or_else(|| RequestError::BadRequest {
        message: "Request body must be a JSON object".to_string(),
    })?;

    if fields.get("tour").is_none_or(Value::is_null) {
        if let Some(Path(path)) = &path {
            if let Some(tour) = path.get("tourId") {
                fields.insert("tour".into(), parse_id(tour)?.to_string().into());
            }
        }
    }
    fields.insert("user".into(), user.id.to_string().into());

    let review = Review::from_payload(payload)?;
    let by_caller = || {
        vec![
            Condition::eq("tour", review.tour.to_string()),
            Condition::eq("user", review.user.to_string()),
        ]
    };

    if state.storage.bookings.find_one(by_caller()).await?.is_none() {
        return Err(AppError::bad_request(
            "User must book this tour before writing a review",
        ));
    }
    if state.storage.reviews.find_one(by_caller()).await?.is_some() {
        return Err(AppError::bad_request(
            "User has already written review for this tour",
        ));
    }

    let created = state.storage.reviews.create(review).await?;
    tracing::info!(review = %created.id, tour = %created.tour, "review created");
    Ok((StatusCode::CREATED, document_envelope(created.output()?)))
}
