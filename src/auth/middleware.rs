//! Authentication and role middleware
//!
//! - [`protect`] rejects requests without a valid session and stores the
//!   caller as [`CurrentUser`] in the request extensions
//! - [`require_role`] rejects callers whose role is not listed
//! - [`is_logged_in`] never rejects; rendered pages use it to know who is
//!   browsing

use super::token::request_token;
use crate::core::error::{AppError, AppResult, AuthError};
use crate::entities::{Role, User};
use crate::server::AppState;
use axum::extract::{FromRequestParts, OptionalFromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::MethodRouter;
use std::convert::Infallible;
use uuid::Uuid;

pub const NOT_LOGGED_IN: &str = "You are not logged in! Please log in to get access.";

pub const ADMIN: &[Role] = &[Role::Admin];
pub const STAFF: &[Role] = &[Role::Admin, Role::LeadGuide];
pub const TOUR_PLANNERS: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];
pub const CUSTOMER: &[Role] = &[Role::User];
pub const CUSTOMER_OR_ADMIN: &[Role] = &[Role::User, Role::Admin];

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized(NOT_LOGGED_IN))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().cloned())
    }
}

/// Resolve the user behind the request's token
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<User> {
    let token = request_token(headers).ok_or_else(|| AppError::unauthorized(NOT_LOGGED_IN))?;
    let claims = state.tokens.verify(token)?;
    let id = Uuid::parse_str(&claims.id).map_err(|_| AuthError::InvalidToken)?;

    let user = state.storage.users.find_by_id(&id).await?.ok_or_else(|| {
        AppError::unauthorized("The user belonging to this token does no longer exist.")
    })?;

    if user.changed_password_after(claims.iat) {
        return Err(AppError::unauthorized(
            "User recently changed password! Please log in again.",
        ));
    }
    Ok(user)
}

pub async fn protect(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    let user = authenticate(&state, req.headers()).await?;
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

pub async fn is_logged_in(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if let Ok(user) = authenticate(&state, req.headers()).await {
        req.extensions_mut().insert(CurrentUser(user));
    }
    next.run(req).await
}

/// Must run after [`protect`]
pub async fn require_role(roles: &'static [Role], req: Request, next: Next) -> AppResult<Response> {
    let role = req
        .extensions()
        .get::<CurrentUser>()
        .map(|CurrentUser(user)| user.role)
        .ok_or_else(|| AppError::unauthorized(NOT_LOGGED_IN))?;

    if !roles.contains(&role) {
        return Err(AppError::forbidden(
            "You do not have permission to perform this action",
        ));
    }
    Ok(next.run(req).await)
}

// =============================================================================
// Route guards
// =============================================================================

/// Only logged-in callers reach `route`
pub fn protected(state: &AppState, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(state.clone(), protect))
}

/// Only logged-in callers with one of `roles` reach `route`
pub fn restricted(
    state: &AppState,
    roles: &'static [Role],
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    // the last layer added runs first, so protect wraps the role check
    protected(
        state,
        route.route_layer(middleware::from_fn(move |req: Request, next: Next| {
            require_role(roles, req, next)
        })),
    )
}
