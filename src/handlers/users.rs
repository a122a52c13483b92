//! User endpoints: account flows, self-service and admin CRUD

use super::bookings;
use super::factory::{self, Resource, document_envelope};
use crate::auth::handlers::{
    forgot_password, login, logout, reset_password, signup, update_my_password,
};
use crate::auth::middleware::ADMIN;
use crate::auth::{CurrentUser, protected, restricted};
use crate::core::entity::Entity;
use crate::core::error::{AppError, AppResult, RequestError};
use crate::core::extractors::JsonBody;
use crate::entities::User;
use crate::server::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::{Map, Value, json};

/// Fields a user may change about themselves
const SELF_EDITABLE: &[&str] = &["name", "email"];

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/forgotPassword", post(forgot_password))
        .route("/resetPassword/{token}", patch(reset_password))
        .route(
            "/updateMyPassword",
            protected(state, patch(update_my_password)),
        )
        .route("/me", protected(state, get(get_me)))
        .route("/updateMe", protected(state, patch(update_me)))
        .route("/deleteMe", protected(state, delete(delete_me)))
        .route("/", restricted(state, ADMIN, get(factory::list::<User>)))
        .route(
            "/{userId}",
            restricted(
                state,
                ADMIN,
                get(factory::get_one::<User>)
                    .patch(factory::update_one::<User>)
                    .delete(factory::delete_one::<User>),
            ),
        )
        .route("/{userId}/bookings", bookings::nested_routes(state))
}

pub async fn get_me(
    State(resource): State<Resource<User>>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Value>> {
    Ok(document_envelope(resource.get_one(&user.id.to_string()).await?))
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<Value>,
) -> AppResult<Json<Value>> {
    let Value::Object(fields) = payload else {
        return Err(RequestError::BadRequest {
            message: "Request body must be a JSON object".to_string(),
        }
        .into());
    };
    if fields.contains_key("password") || fields.contains_key("passwordConfirm") {
        return Err(AppError::bad_request(
            "This route is not for password updates. Please use /updateMyPassword.",
        ));
    }

    let allowed: Map<String, Value> = fields
        .into_iter()
        .filter(|(key, _)| SELF_EDITABLE.contains(&key.as_str()))
        .collect();

    let updated = state
        .storage
        .users
        .update_by_id(&user.id, Value::Object(allowed))
        .await?
        .ok_or_else(|| AppError::not_found(User::resource_name_singular(), user.id.to_string()))?;

    Ok(Json(json!({
        "status": "success",
        "data": { "user": updated.output()? }
    })))
}

/// Deactivate the caller's account; inactive users vanish from every find
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<StatusCode> {
    state
        .storage
        .users
        .update_by_id(&user.id, json!({ "active": false }))
        .await?;
    tracing::info!(user = %user.id, "account deactivated");
    Ok(StatusCode::NO_CONTENT)
}
