//! Typed error handling for the tour booking service
//!
//! Every handler returns [`AppResult`]. The error carries its category so the
//! HTTP boundary can pick a status code and a stable error code without
//! inspecting message strings.
//!
//! # Error Categories
//!
//! - [`EntityError`]: lookups that found nothing
//! - [`ValidationError`]: payloads, ids and query strings that failed checks
//! - [`StorageError`]: backend failures and unique-key conflicts
//! - [`RequestError`]: authorization, rate limiting, rejected bodies
//! - [`AuthError`]: token problems
//! - [`PaymentError`]: checkout provider and webhook failures
//! - [`MailError`]: outgoing mail failures
//!
//! The JSON body mirrors the envelope used by successful responses:
//!
//! ```json
//! { "status": "fail", "code": "ENTITY_NOT_FOUND", "message": "No document found with that ID" }
//! ```
//!
//! `status` is `"fail"` for 4xx and `"error"` for everything else.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

pub use crate::mail::MailError;
pub use crate::payments::PaymentError;

/// The main error type of the service
#[derive(Debug)]
pub enum AppError {
    /// Entity lookups
    Entity(EntityError),

    /// Input validation
    Validation(ValidationError),

    /// Storage backend errors
    Storage(StorageError),

    /// HTTP/Request errors
    Request(RequestError),

    /// JWT verification
    Auth(AuthError),

    /// Checkout provider and webhook errors
    Payment(PaymentError),

    /// Outgoing mail
    Mail(MailError),

    /// Everything else
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Entity(e) => write!(f, "{}", e),
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Storage(e) => write!(f, "{}", e),
            AppError::Request(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Payment(e) => write!(f, "{}", e),
            AppError::Mail(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Entity(e) => Some(e),
            AppError::Validation(e) => Some(e),
            AppError::Storage(e) => Some(e),
            AppError::Request(e) => Some(e),
            AppError::Auth(e) => Some(e),
            AppError::Payment(e) => Some(e),
            AppError::Mail(e) => Some(e),
            AppError::Internal(_) => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// `fail` for client errors, `error` for server errors
    pub status: &'static str,
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Marker placed in the extensions of error responses whose message is an
/// implementation detail (internal and backend failures).
///
/// Lets outer middleware mask those bodies in production without re-parsing
/// them.
#[derive(Debug, Clone, Copy)]
pub struct ErrorMarker;

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Entity(e) => e.status_code(),
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(e) => e.status_code(),
            AppError::Request(e) => e.status_code(),
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Payment(e) => e.status_code(),
            AppError::Mail(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Entity(e) => e.error_code(),
            AppError::Validation(e) => e.error_code(),
            AppError::Storage(e) => e.error_code(),
            AppError::Request(e) => e.error_code(),
            AppError::Auth(e) => e.error_code(),
            AppError::Payment(e) => e.error_code(),
            AppError::Mail(_) => "MAIL_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// `true` when the client caused the error
    pub fn is_operational(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// `false` for failures whose message must not reach clients in production
    pub fn is_exposable(&self) -> bool {
        !matches!(
            self,
            AppError::Internal(_) | AppError::Storage(StorageError::Backend { .. })
        )
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            status: if self.is_operational() { "fail" } else { "error" },
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    /// Get additional details for the error
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Entity(EntityError::NotFound { entity_type, id }) => {
                Some(serde_json::json!({
                    "entity_type": entity_type,
                    "id": id
                }))
            }
            AppError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            _ => None,
        }
    }

    // === Shorthands for the errors handlers raise most ===

    pub fn not_found(entity_type: &str, id: impl Into<String>) -> Self {
        AppError::Entity(EntityError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.into(),
        })
    }

    /// A 404 with a message tailored to the lookup
    pub fn no_match(message: impl Into<String>) -> Self {
        AppError::Entity(EntityError::NoMatch {
            message: message.into(),
        })
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::Request(RequestError::BadRequest {
            message: message.into(),
        })
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Request(RequestError::Unauthorized {
            message: message.into(),
        })
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Request(RequestError::Forbidden {
            message: message.into(),
        })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }
        let body = Json(self.to_response());
        let mut response = (status, body).into_response();
        if !self.is_exposable() {
            response.extensions_mut().insert(ErrorMarker);
        }
        response
    }
}

// =============================================================================
// Entity Errors
// =============================================================================

/// Errors related to entity lookups
#[derive(Debug)]
pub enum EntityError {
    /// No entity with the requested id
    NotFound { entity_type: String, id: String },

    /// A lookup by some other key came back empty
    NoMatch { message: String },
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityError::NotFound { .. } => write!(f, "No document found with that ID"),
            EntityError::NoMatch { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for EntityError {}

impl EntityError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::NOT_FOUND
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EntityError::NotFound { .. } => "ENTITY_NOT_FOUND",
            EntityError::NoMatch { .. } => "NO_MATCH",
        }
    }
}

impl From<EntityError> for AppError {
    fn from(err: EntityError) -> Self {
        AppError::Entity(err)
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to input validation
#[derive(Debug)]
pub enum ValidationError {
    /// One or more fields violate the entity's constraints
    FieldErrors(Vec<FieldValidationError>),

    /// Body could not be read into the target type
    InvalidJson { message: String },

    /// Malformed entity id
    InvalidId { field: String, value: String },

    /// Malformed query string
    InvalidQuery { message: String },
}

/// A single field validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

impl FieldValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::FieldErrors(errors) => {
                let msgs: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
                write!(f, "Invalid input data. {}", msgs.join(". "))
            }
            ValidationError::InvalidJson { message } => {
                write!(f, "Invalid input data. {}", message)
            }
            ValidationError::InvalidId { field, value } => {
                write!(f, "Invalid {}: {}.", field, value)
            }
            ValidationError::InvalidQuery { message } => {
                write!(f, "Invalid query: {}", message)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::FieldErrors(_) => "VALIDATION_ERROR",
            ValidationError::InvalidJson { .. } => "INVALID_JSON",
            ValidationError::InvalidId { .. } => "INVALID_ID",
            ValidationError::InvalidQuery { .. } => "INVALID_QUERY",
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldValidationError> = Vec::new();

        for (field, kind) in errors.errors() {
            collect_field_errors(field.as_ref(), kind, &mut fields);
        }
        fields.sort_by(|a, b| a.field.cmp(&b.field));

        AppError::Validation(ValidationError::FieldErrors(fields))
    }
}

fn collect_field_errors(
    field: &str,
    kind: &validator::ValidationErrorsKind,
    out: &mut Vec<FieldValidationError>,
) {
    use validator::ValidationErrorsKind;

    match kind {
        ValidationErrorsKind::Field(errors) => {
            for error in errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid ({})", field, error.code));
                out.push(FieldValidationError::new(field, message));
            }
        }
        ValidationErrorsKind::Struct(nested) => {
            for (inner, kind) in nested.errors() {
                collect_field_errors(&format!("{}.{}", field, inner), kind, out);
            }
        }
        ValidationErrorsKind::List(items) => {
            for (index, nested) in items {
                for (inner, kind) in nested.errors() {
                    collect_field_errors(&format!("{}[{}].{}", field, index, inner), kind, out);
                }
            }
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to storage backends
#[derive(Debug)]
pub enum StorageError {
    /// A unique key is already taken
    Duplicate { fields: Vec<String>, value: String },

    /// Backend failure
    Backend { backend: String, message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Duplicate { value, .. } => {
                write!(f, "Duplicate field value: {}. Please use another value!", value)
            }
            StorageError::Backend { backend, message } => {
                write!(f, "{} storage error: {}", backend, message)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl StorageError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StorageError::Duplicate { .. } => StatusCode::BAD_REQUEST,
            StorageError::Backend { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::Duplicate { .. } => "DUPLICATE_KEY",
            StorageError::Backend { .. } => "STORAGE_ERROR",
        }
    }

    pub fn backend(backend: &str, message: impl fmt::Display) -> Self {
        StorageError::Backend {
            backend: backend.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to HTTP requests
#[derive(Debug)]
pub enum RequestError {
    /// Request is well-formed but breaks a business rule
    BadRequest { message: String },

    /// Body was rejected before reaching the handler
    Rejected { status: StatusCode, message: String },

    /// Caller is not authenticated
    Unauthorized { message: String },

    /// Caller lacks the required role
    Forbidden { message: String },

    /// Per-client request quota exhausted
    TooManyRequests,

    /// No route matched
    RouteNotFound { path: String },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::BadRequest { message } => write!(f, "{}", message),
            RequestError::Rejected { message, .. } => write!(f, "{}", message),
            RequestError::Unauthorized { message } => write!(f, "{}", message),
            RequestError::Forbidden { message } => write!(f, "{}", message),
            RequestError::TooManyRequests => write!(
                f,
                "Too many requests from this IP, please try again in an hour!"
            ),
            RequestError::RouteNotFound { path } => {
                write!(f, "Can't find {} on this server!", path)
            }
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            RequestError::Rejected { status, .. } => *status,
            RequestError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            RequestError::Forbidden { .. } => StatusCode::FORBIDDEN,
            RequestError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            RequestError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::BadRequest { .. } => "BAD_REQUEST",
            RequestError::Rejected { .. } => "INVALID_BODY",
            RequestError::Unauthorized { .. } => "UNAUTHORIZED",
            RequestError::Forbidden { .. } => "FORBIDDEN",
            RequestError::TooManyRequests => "TOO_MANY_REQUESTS",
            RequestError::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
        }
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        AppError::Request(err)
    }
}

// =============================================================================
// Auth Errors
// =============================================================================

/// Errors raised while verifying a bearer token
#[derive(Debug)]
pub enum AuthError {
    InvalidToken,
    ExpiredToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidToken => write!(f, "Invalid token. Please log in again!"),
            AuthError::ExpiredToken => {
                write!(f, "Your token has expired! Please log in again.")
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::ExpiredToken => "TOKEN_EXPIRED",
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::Auth(AuthError::ExpiredToken)
            }
            _ => AppError::Auth(AuthError::InvalidToken),
        }
    }
}

// =============================================================================
// Collaborator errors
// =============================================================================

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        AppError::Payment(err)
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        AppError::Mail(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(ValidationError::InvalidJson {
            message: err.to_string(),
        })
    }
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        AppError::Internal(format!("template rendering failed: {:?}", err))
    }
}

/// anyhow errors come from infrastructure code and are never the client's fault
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for service operations
pub type AppResult<T> = Result<T, AppError>;

// =============================================================================
// Tests
// =============================================================================
