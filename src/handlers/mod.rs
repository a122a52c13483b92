//! HTTP handlers for the JSON API
//!
//! [`factory`] holds the generic CRUD handlers; the other modules add the
//! endpoints specific to one resource and their routers.

pub mod bookings;
pub mod factory;
pub mod reviews;
pub mod tours;
pub mod users;

pub use factory::{Resource, document_envelope, list_envelope};

use crate::auth::token::is_secure;
use crate::server::AppState;
use axum::http::{HeaderMap, header};

/// Absolute base URL for links sent to the client (emails, redirects)
///
/// The configured public URL wins; otherwise the request's `Host` header is
/// used the way the client reached us.
pub fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.config.server.public_url {
        return url.trim_end_matches('/').to_string();
    }
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => {
            let scheme = if is_secure(headers) { "https" } else { "http" };
            format!("{}://{}", scheme, host)
        }
        None => state.config.server.base_url(),
    }
}
