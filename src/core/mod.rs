//! Core module containing the traits and types every resource shares

pub mod entity;
pub mod error;
pub mod expansion;
pub mod extractors;
pub mod query;
pub mod service;
pub mod timestamp;

pub use entity::{Entity, parse_id, sanitize, writable_patch};
pub use error::{AppError, AppResult};
pub use expansion::Expansion;
pub use extractors::{ApiQuery, JsonBody};
pub use query::{
    Comparison, Condition, Predicate, Projection, QueryFeatures, QueryParams, QuerySpec, SortKey,
};
pub use service::DataService;
