//! Rendered pages: overview, tour detail, login, signup and the account
//! pages of the logged-in user

use crate::auth::CurrentUser;
use crate::auth::is_logged_in;
use crate::auth::middleware::NOT_LOGGED_IN;
use crate::core::entity::Entity;
use crate::core::error::{AppError, AppResult};
use crate::core::query::{Condition, QueryParams};
use crate::entities::User;
use crate::server::AppState;
use axum::extract::{Form, Path, Query, State};
use axum::middleware;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use tera::Context;

const BOOKING_ALERT: &str = "Your booking was successful! Please check your email for a \
     confirmation. If your booking doesn't show up here immediately, please come back later.";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/tour/{slug}", get(tour))
        .route("/login", get(login_form))
        .route("/signup", get(signup_form))
        .route("/me", get(account))
        .route("/my-tours", get(my_tours))
        .route("/submit-user-data", post(update_user_data))
        .route_layer(middleware::from_fn_with_state(state.clone(), is_logged_in))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub alert: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccountForm {
    pub name: String,
    pub email: String,
}

/// Context every page shares: title, the visitor and the alert banner
fn page_context(title: &str, user: Option<&User>, query: &PageQuery) -> AppResult<Context> {
    let mut context = Context::new();
    context.insert("title", title);
    if let Some(user) = user {
        context.insert("user", &user.output()?);
    }
    if query.alert.as_deref() == Some("booking") {
        context.insert("alert", BOOKING_ALERT);
    }
    Ok(context)
}

/// Render `result`, or the error page in its place
fn respond(state: &AppState, result: AppResult<Html<String>>) -> Response {
    match result {
        Ok(html) => html.into_response(),
        Err(err) => {
            if err.status_code().is_server_error() {
                tracing::error!(error = %err, code = err.error_code(), "page failed");
            }
            state
                .views
                .error_page(&err, state.config.environment.is_production())
        }
    }
}

fn logged_in(user: Option<CurrentUser>) -> AppResult<User> {
    user.map(|CurrentUser(user)| user)
        .ok_or_else(|| AppError::unauthorized(NOT_LOGGED_IN))
}

pub async fn overview(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Response {
    let result = async {
        let tours = state
            .tours()
            .get_all(&HashMap::new(), &QueryParams::new())
            .await?;
        let user = user.map(|CurrentUser(user)| user);
        let mut context = page_context("All Tours", user.as_ref(), &query)?;
        context.insert("tours", &tours);
        state.views.render("overview.html", &context)
    }
    .await;
    respond(&state, result)
}

pub async fn tour(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Path(slug): Path<String>,
) -> Response {
    let result = async {
        let found = state
            .storage
            .tours
            .find_one(vec![Condition::eq("slug", slug.as_str())])
            .await?
            .ok_or_else(|| AppError::no_match("There is no tour with that name."))?;
        let tour = state.tours().get_one(&found.id.to_string()).await?;

        let user = user.map(|CurrentUser(user)| user);
        let title = format!("{} Tour", found.name);
        let mut context = page_context(&title, user.as_ref(), &PageQuery::default())?;
        context.insert("tour", &tour);
        state.views.render("tour.html", &context)
    }
    .await;
    respond(&state, result)
}

pub async fn login_form(State(state): State<AppState>, user: Option<CurrentUser>) -> Response {
    let user = user.map(|CurrentUser(user)| user);
    let result = page_context("Log into your account", user.as_ref(), &PageQuery::default())
        .and_then(|context| state.views.render("login.html", &context));
    respond(&state, result)
}

pub async fn signup_form(State(state): State<AppState>, user: Option<CurrentUser>) -> Response {
    let user = user.map(|CurrentUser(user)| user);
    let result = page_context("Sign Up", user.as_ref(), &PageQuery::default())
        .and_then(|context| state.views.render("signup.html", &context));
    respond(&state, result)
}

pub async fn account(State(state): State<AppState>, user: Option<CurrentUser>) -> Response {
    let result = logged_in(user).and_then(|user| {
        let context = page_context("Your account", Some(&user), &PageQuery::default())?;
        state.views.render("account.html", &context)
    });
    respond(&state, result)
}

/// Tours the visitor has booked, rendered like the overview
pub async fn my_tours(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Response {
    let result = async {
        let user = logged_in(user)?;
        let bookings = state
            .storage
            .bookings
            .find_all(vec![Condition::eq("user", user.id.to_string())])
            .await?;
        let tour_ids: Vec<Value> = bookings
            .iter()
            .map(|booking| json!(booking.tour.to_string()))
            .collect();

        let tours = state
            .storage
            .tours
            .find_all(vec![Condition::is_in("id", tour_ids)])
            .await?
            .into_iter()
            .map(|tour| tour.output())
            .collect::<AppResult<Vec<_>>>()?;

        let mut context = page_context("My Tours", Some(&user), &query)?;
        context.insert("tours", &tours);
        state.views.render("overview.html", &context)
    }
    .await;
    respond(&state, result)
}

pub async fn update_user_data(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Form(form): Form<AccountForm>,
) -> Response {
    let result = async {
        let user = logged_in(user)?;
        let updated = state
            .storage
            .users
            .update_by_id(&user.id, json!({ "name": form.name, "email": form.email }))
            .await?
            .ok_or_else(|| AppError::not_found(User::resource_name_singular(), user.id.to_string()))?;

        let context = page_context("Your account", Some(&updated), &PageQuery::default())?;
        state.views.render("account.html", &context)
    }
    .await;
    respond(&state, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_alert_only_for_bookings() {
        let query = PageQuery {
            alert: Some("booking".into()),
        };
        let context = page_context("My Tours", None, &query).unwrap();
        assert_eq!(context.get("alert").and_then(|v| v.as_str()), Some(BOOKING_ALERT));

        let query = PageQuery {
            alert: Some("other".into()),
        };
        let context = page_context("My Tours", None, &query).unwrap();
        assert!(context.get("alert").is_none());
    }
}
