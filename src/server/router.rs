//! Application router: the JSON API, the webhook, rendered pages and the
//! middleware stack around them

use super::rate_limit::{ApiRateLimit, limit_requests};
use super::state::AppState;
use crate::config::AppConfig;
use crate::core::error::{AppError, ErrorMarker, RequestError};
use crate::handlers::{bookings, reviews, tours, users};
use crate::views;
use axum::extract::{OriginalUri, Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub const API_PREFIX: &str = "/api/v1";

/// Build the complete application
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let api = Router::new()
        .nest("/tours", tours::routes(&state))
        .nest("/users", users::routes(&state))
        .nest("/reviews", reviews::routes(&state))
        .nest("/bookings", bookings::routes(&state))
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
        .layer(middleware::from_fn_with_state(
            ApiRateLimit::new(&config.rate_limit),
            limit_requests,
        ));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        // signed over the raw body, so it stays outside the API body limit
        .route("/webhook-checkout", post(bookings::webhook_checkout))
        .nest(API_PREFIX, api)
        .merge(views::routes(&state))
        .fallback(route_not_found)
        .with_state(state);

    // outermost first
    with_security_headers(app).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(CompressionLayer::new())
            .layer(middleware::from_fn_with_state(config, mask_errors)),
    )
}

fn with_security_headers(app: Router) -> Router {
    [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
        (header::X_XSS_PROTECTION, "0"),
        (header::REFERRER_POLICY, "no-referrer"),
    ]
    .into_iter()
    .fold(app, |app, (name, value)| {
        app.layer(SetResponseHeaderLayer::if_not_present(
            name,
            HeaderValue::from_static(value),
        ))
    })
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME")
    }))
}

async fn route_not_found(OriginalUri(uri): OriginalUri) -> AppError {
    RequestError::RouteNotFound {
        path: uri.path().to_string(),
    }
    .into()
}

/// In production, replace the body of internal failures with a generic
/// message; the details were logged where the error was raised
async fn mask_errors(State(config): State<Arc<AppConfig>>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if !config.environment.is_production() || response.extensions().get::<ErrorMarker>().is_none()
    {
        return response;
    }

    (
        response.status(),
        Json(json!({
            "status": "error",
            "message": "Something went very wrong!"
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use axum_test::TestServer;

    fn failing_app(environment: Environment) -> TestServer {
        let config = Arc::new(AppConfig {
            environment,
            ..AppConfig::default()
        });
        let app = Router::new()
            .route(
                "/boom",
                get(|| async { AppError::Internal("pool exhausted".to_string()) }),
            )
            .route(
                "/missing",
                get(|| async { AppError::no_match("There is no tour with that name.") }),
            )
            .layer(middleware::from_fn_with_state(config, mask_errors));
        TestServer::new(app)
    }

    #[tokio::test]
    async fn test_production_masks_internal_errors() {
        let server = failing_app(Environment::Production);

        let response = server.get("/boom").await;
        response.assert_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.json::<Value>()["message"],
            "Something went very wrong!"
        );

        let response = server.get("/missing").await;
        response.assert_status(axum::http::StatusCode::NOT_FOUND);
        assert_eq!(
            response.json::<Value>()["message"],
            "There is no tour with that name."
        );
    }

    #[tokio::test]
    async fn test_development_shows_details() {
        let server = failing_app(Environment::Development);

        let response = server.get("/boom").await;
        assert_eq!(
            response.json::<Value>()["message"],
            "Internal error: pool exhausted"
        );
    }
}
