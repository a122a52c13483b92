//! Service trait for data operations

use crate::core::entity::Entity;
use crate::core::error::AppResult;
use crate::core::query::{Condition, QuerySpec};
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

/// Service trait for managing one entity type
///
/// Implementations apply [`Entity::base_filter`] to every read, update and
/// delete, and enforce [`Entity::unique_keys`]. The framework is agnostic to
/// the underlying storage mechanism.
#[async_trait]
pub trait DataService<T: Entity>: Send + Sync {
    /// Run a query; documents come back in stored form, projected per `spec`
    async fn find_many(&self, spec: &QuerySpec) -> AppResult<Vec<Value>>;

    /// Get an entity by ID
    async fn find_by_id(&self, id: &Uuid) -> AppResult<Option<T>>;

    /// Persist a new, already validated entity
    async fn create(&self, entity: T) -> AppResult<T>;

    /// Merge `patch` into the stored entity, validate, and persist
    ///
    /// Returns `Ok(None)` if nothing matches `id`.
    async fn update_by_id(&self, id: &Uuid, patch: Value) -> AppResult<Option<T>>;

    /// Remove an entity, returning what was removed
    async fn delete_by_id(&self, id: &Uuid) -> AppResult<Option<T>>;

    // === Typed helpers ===

    /// All entities matching `filter`, unprojected and in storage order
    async fn find_all(&self, filter: Vec<Condition>) -> AppResult<Vec<T>> {
        self.find_many(&QuerySpec::filtered(filter))
            .await?
            .into_iter()
            .map(T::from_document)
            .collect()
    }

    /// First entity matching `filter`
    async fn find_one(&self, filter: Vec<Condition>) -> AppResult<Option<T>> {
        let spec = QuerySpec {
            filter,
            limit: Some(1),
            ..QuerySpec::default()
        };
        self.find_many(&spec)
            .await?
            .into_iter()
            .next()
            .map(T::from_document)
            .transpose()
    }
}
