//! Booking endpoints: staff CRUD, hosted checkout and the payment webhook

use super::base_url;
use super::factory::{self, Resource, document_envelope};
use crate::auth::middleware::STAFF;
use crate::auth::{CurrentUser, protected, restricted};
use crate::core::entity::{Entity, parse_id};
use crate::core::error::{AppError, AppResult, RequestError};
use crate::core::extractors::JsonBody;
use crate::core::query::Condition;
use crate::entities::{Booking, Tour};
use crate::payments::webhook::SIGNATURE_HEADER;
use crate::payments::{CheckoutRequest, CompletedCheckout, LineItem, PaymentError, to_minor_units};
use crate::server::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{MethodRouter, get};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Staff-only `GET`/`POST` on a booking collection; mounted at `/bookings`,
/// `/tours/{tourId}/bookings` and `/users/{userId}/bookings`
pub fn nested_routes(state: &AppState) -> MethodRouter<AppState> {
    restricted(
        state,
        STAFF,
        get(factory::list::<Booking>).post(create_booking),
    )
}

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/checkout-session/{tourId}",
            protected(state, get(checkout_session)),
        )
        .route("/", nested_routes(state))
        .route(
            "/{id}",
            restricted(
                state,
                STAFF,
                get(factory::get_one::<Booking>)
                    .patch(factory::update_one::<Booking>)
                    .delete(factory::delete_one::<Booking>),
            ),
        )
}

/// Generic create, with `tour`/`user` defaulting to the ids in the route
pub async fn create_booking(
    State(resource): State<Resource<Booking>>,
    path: Option<Path<HashMap<String, String>>>,
    JsonBody(mut payload): JsonBody<Value>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let fields = payload.as_object_mut().ok_or_else(|| RequestError::BadRequest {
        message: "Request body must be a JSON object".to_string(),
    })?;

    let path = path.map(|Path(p)| p).unwrap_or_default();
    for (param, field) in [("tourId", "tour"), ("userId", "user")] {
        if let Some(raw) = path.get(param) {
            if fields.get(field).is_none_or(Value::is_null) {
                fields.insert(field.into(), parse_id(raw)?.to_string().into());
            }
        }
    }

    let created = resource.create_one(payload).await?;
    Ok((StatusCode::CREATED, document_envelope(created.output()?)))
}

/// Open a hosted checkout page for one tour
pub async fn checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    CurrentUser(user): CurrentUser,
    Path(tour_id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&tour_id)?;
    let tour = state
        .storage
        .tours
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(Tour::resource_name_singular(), &tour_id))?;

    let base = base_url(&state, &headers);
    let payments = &state.config.payments;
    let image_base = payments
        .image_base_url
        .clone()
        .unwrap_or_else(|| base.clone());

    let request = CheckoutRequest {
        customer_email: user.email.clone(),
        client_reference_id: tour.id.to_string(),
        success_url: format!("{}/my-tours?alert=booking", base),
        cancel_url: format!("{}/tour/{}", base, tour.slug),
        currency: payments.currency.clone(),
        line_item: LineItem {
            name: format!("{} Tour", tour.name),
            description: tour.summary.clone(),
            images: vec![format!(
                "{}/img/tours/{}",
                image_base.trim_end_matches('/'),
                tour.image_cover
            )],
            unit_amount: to_minor_units(tour.price),
            quantity: 1,
        },
    };

    let session = state.payments.create_checkout_session(request).await?;
    tracing::info!(tour = %tour.id, user = %user.id, session = %session.id, "checkout session created");

    Ok(Json(json!({ "status": "success", "session": session })))
}

/// Payment provider callback; records a paid booking for each completed
/// checkout
pub async fn webhook_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let verifier = state.webhooks.as_ref().ok_or(PaymentError::NotConfigured)?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| PaymentError::Webhook(format!("missing {} header", SIGNATURE_HEADER)))?;

    let event = verifier.construct_event(&body, signature)?;
    match event.completed_checkout()? {
        Some(session) => {
            let booking = booking_from_checkout(&state, &session).await?;
            tracing::info!(booking = %booking.id, tour = %booking.tour, "booking paid");
        }
        None => tracing::debug!(kind = %event.kind, "ignoring webhook event"),
    }

    Ok(Json(json!({ "received": true })))
}

async fn booking_from_checkout(state: &AppState, session: &CompletedCheckout) -> AppResult<Booking> {
    let tour = session
        .client_reference_id
        .as_deref()
        .ok_or_else(|| PaymentError::Webhook("checkout session has no tour reference".into()))?;
    let tour = parse_id(tour)?;

    let email = session
        .email()
        .ok_or_else(|| PaymentError::Webhook("checkout session has no customer email".into()))?;
    let user = state
        .storage
        .users
        .find_one(vec![Condition::eq("email", email.trim().to_lowercase())])
        .await?
        .ok_or_else(|| PaymentError::Webhook(format!("no user with email {}", email)))?;

    let price = session.amount_total.unwrap_or_default() as f64 / 100.0;
    state
        .storage
        .bookings
        .create(Booking::paid(tour, user.id, price))
        .await
}
