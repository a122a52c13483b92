//! # Tourbook
//!
//! A tour booking service: a JSON API for tours, reviews, bookings and
//! users, server-rendered pages, JWT sessions and hosted checkout.
//!
//! ## Features
//!
//! - **Query pipeline**: list endpoints accept filters (`price[gte]=500`),
//!   `sort`, `fields`, `page` and `limit` parameters
//! - **Handler factory**: one generic set of CRUD handlers for every resource
//! - **Pluggable storage**: in-memory by default, MongoDB behind the
//!   `mongodb_backend` feature
//! - **Auth**: argon2 password hashes, JWT in a bearer header or cookie, role
//!   guards per route
//! - **Payments**: Stripe checkout sessions and signed webhooks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tourbook::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::from_yaml_file("config/tourbook.yaml")?.apply_env()?;
//!     ServerBuilder::new(config).serve().await
//! }
//! ```

pub mod auth;
pub mod config;
pub mod core;
pub mod entities;
pub mod handlers;
pub mod mail;
pub mod payments;
pub mod server;
pub mod storage;
pub mod views;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        AppError, AppResult, Comparison, Condition, DataService, Entity, QueryFeatures,
        QueryParams, QuerySpec,
    };

    // === Entities ===
    pub use crate::entities::{Booking, Difficulty, Review, Role, Tour, User};

    // === Storage ===
    pub use crate::storage::{InMemoryDataService, Storage};
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoDataService;

    // === Config ===
    pub use crate::config::{AppConfig, Environment};

    // === Server ===
    pub use crate::handlers::Resource;
    pub use crate::server::{AppState, ServerBuilder, build_router};

    // === Collaborators ===
    pub use crate::auth::{PasswordHasher, TokenSigner};
    pub use crate::mail::{Email, LogMailer, Mailer, MemoryMailer};
    pub use crate::payments::{PaymentGateway, WebhookVerifier};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use uuid::Uuid;
}
