//! Signup, login and password management endpoints

use super::middleware::CurrentUser;
use super::token::{digest, is_secure, logout_cookie, reset_token, session_cookie};
use crate::core::entity::Entity;
use crate::core::error::{AppError, AppResult, FieldValidationError, ValidationError};
use crate::core::extractors::JsonBody;
use crate::core::query::{Comparison, Condition};
use crate::core::timestamp;
use crate::entities::User;
use crate::handlers::base_url;
use crate::mail::Email;
use crate::server::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
    pub photo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub password_current: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

/// Length and confirmation rules for a new password
fn check_new_password(state: &AppState, password: &str, confirm: &str) -> AppResult<()> {
    let min = state.config.auth.password_min_length;
    let mut errors = Vec::new();

    if (password.chars().count() as u64) < min {
        errors.push(FieldValidationError::new(
            "password",
            format!("A password must have at least {} characters", min),
        ));
    }
    if password != confirm {
        errors.push(FieldValidationError::new(
            "passwordConfirm",
            "Passwords are not the same!",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::FieldErrors(errors).into())
    }
}

/// Issue a session token in the body and in the cookie
pub fn send_token(
    state: &AppState,
    headers: &HeaderMap,
    user: &User,
    status: StatusCode,
) -> AppResult<Response> {
    let token = state.tokens.sign(&user.id)?;
    let cookie = session_cookie(
        &token,
        state.config.auth.cookie_expires_in_days,
        is_secure(headers),
    );

    let body = json!({
        "status": "success",
        "token": token,
        "data": { "user": user.output()? }
    });
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

async fn find_by_email(state: &AppState, email: &str) -> AppResult<Option<User>> {
    state
        .storage
        .users
        .find_one(vec![Condition::eq("email", email.trim().to_lowercase())])
        .await
}

pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<SignupRequest>,
) -> AppResult<Response> {
    payload.validate()?;
    check_new_password(&state, &payload.password, &payload.password_confirm)?;

    let hash = state.passwords.hash(&payload.password)?;
    let mut user = User::new(&payload.name, &payload.email, hash);
    if let Some(photo) = payload.photo.filter(|p| !p.trim().is_empty()) {
        user.photo = photo;
    }
    user.validate()?;

    let user = state.storage.users.create(user).await?;
    tracing::info!(user = %user.id, "new user signed up");

    let account_url = format!("{}/me", base_url(&state, &headers));
    let welcome = Email::welcome(&state.config.mail.from, &user, &account_url);
    if let Err(e) = state.mailer.send(welcome).await {
        tracing::warn!(user = %user.id, error = ?e, "welcome email was not delivered");
    }

    send_token(&state, &headers, &user, StatusCode::CREATED)
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Response> {
    let (Some(email), Some(password)) = (
        payload.email.filter(|e| !e.is_empty()),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::bad_request("Please provide email and password!"));
    };

    let user = find_by_email(&state, &email).await?;
    let authenticated = match &user {
        Some(user) => state.passwords.verify(&password, &user.password)?,
        None => false,
    };

    match user {
        Some(user) if authenticated => send_token(&state, &headers, &user, StatusCode::OK),
        _ => Err(AppError::unauthorized("Incorrect email or password")),
    }
}

pub async fn logout() -> Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, logout_cookie())],
        Json(json!({ "status": "success" })),
    )
        .into_response()
}

pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<ForgotPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let user = find_by_email(&state, &payload.email)
        .await?
        .ok_or_else(|| AppError::no_match("There is no user with that email address."))?;

    let ttl = state.config.auth.reset_token_ttl_minutes;
    let token = reset_token();
    let expires = Utc::now() + Duration::minutes(ttl);
    state
        .storage
        .users
        .update_by_id(
            &user.id,
            json!({
                "passwordResetToken": token.digest,
                "passwordResetExpires": timestamp::format(&expires),
            }),
        )
        .await?;

    let reset_url = format!(
        "{}/api/v1/users/resetPassword/{}",
        base_url(&state, &headers),
        token.plain
    );
    let email = Email::password_reset(&state.config.mail.from, &user, &reset_url, ttl);

    if let Err(e) = state.mailer.send(email).await {
        tracing::error!(user = %user.id, error = ?e, "password reset email failed");
        state
            .storage
            .users
            .update_by_id(
                &user.id,
                json!({ "passwordResetToken": null, "passwordResetExpires": null }),
            )
            .await?;
        return Err(e.into());
    }

    Ok(Json(json!({
        "status": "success",
        "message": "Token sent to email!"
    })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> AppResult<Response> {
    let now = timestamp::format(&Utc::now());
    let user = state
        .storage
        .users
        .find_one(vec![
            Condition::eq("passwordResetToken", digest(&token)),
            Condition::cmp("passwordResetExpires", Comparison::Gt, now),
        ])
        .await?
        .ok_or_else(|| AppError::bad_request("Token is invalid or has expired"))?;

    check_new_password(&state, &payload.password, &payload.password_confirm)?;
    let hash = state.passwords.hash(&payload.password)?;

    let user = state
        .storage
        .users
        .update_by_id(&user.id, User::password_patch(&hash))
        .await?
        .ok_or_else(|| AppError::not_found(User::resource_name_singular(), user.id.to_string()))?;

    send_token(&state, &headers, &user, StatusCode::OK)
}

pub async fn update_my_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<UpdatePasswordRequest>,
) -> AppResult<Response> {
    if !state.passwords.verify(&payload.password_current, &user.password)? {
        return Err(AppError::unauthorized("Your current password is wrong."));
    }

    check_new_password(&state, &payload.password, &payload.password_confirm)?;
    let hash = state.passwords.hash(&payload.password)?;

    let user = state
        .storage
        .users
        .update_by_id(&user.id, User::password_patch(&hash))
        .await?
        .ok_or_else(|| AppError::not_found(User::resource_name_singular(), user.id.to_string()))?;

    send_token(&state, &headers, &user, StatusCode::OK)
}
