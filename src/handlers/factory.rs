//! Generic resource handlers
//!
//! A [`Resource<T>`] turns any [`DataService<T>`] into the five standard
//! operations (list, get-one, create, update, delete). The operations are
//! plain async methods so custom handlers can reuse them; the free functions
//! at the bottom are the axum handlers that wrap them in the JSON envelope:
//!
//! ```json
//! { "status": "success", "results": 2, "data": { "data": [...] } }
//! ```

use crate::core::entity::{Entity, parse_id, writable_patch};
use crate::core::error::{AppError, AppResult};
use crate::core::expansion::Expansion;
use crate::core::extractors::{ApiQuery, JsonBody, TargetId};
use crate::core::query::{Condition, QueryFeatures, QueryParams, QuerySpec};
use crate::core::service::DataService;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

/// Store plus routing metadata for one entity type
pub struct Resource<T: Entity> {
    service: Arc<dyn DataService<T>>,
    /// `(route parameter, entity field)` pairs scoping nested lists
    scopes: Vec<(&'static str, &'static str)>,
    expansions: Vec<Expansion>,
    detail_expansions: Vec<Expansion>,
}

impl<T: Entity> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            scopes: self.scopes.clone(),
            expansions: self.expansions.clone(),
            detail_expansions: self.detail_expansions.clone(),
        }
    }
}

impl<T: Entity> Resource<T> {
    pub fn new(service: Arc<dyn DataService<T>>) -> Self {
        Self {
            service,
            scopes: Vec::new(),
            expansions: Vec::new(),
            detail_expansions: Vec::new(),
        }
    }

    /// Filter lists by `field` when the route carries `param`
    /// (e.g. `/tours/{tourId}/reviews` → `tour == tourId`)
    pub fn scoped(mut self, param: &'static str, field: &'static str) -> Self {
        self.scopes.push((param, field));
        self
    }

    /// Expand related documents on every read
    pub fn expand(mut self, expansion: Expansion) -> Self {
        self.expansions.push(expansion);
        self
    }

    /// Expand related documents on get-one only
    pub fn expand_detail(mut self, expansion: Expansion) -> Self {
        self.detail_expansions.push(expansion);
        self
    }

    pub fn service(&self) -> &Arc<dyn DataService<T>> {
        &self.service
    }

    /// Conditions derived from the ancestor ids in the route
    pub fn ancestor_filter(&self, path: &HashMap<String, String>) -> AppResult<Vec<Condition>> {
        self.scopes
            .iter()
            .filter_map(|(param, field)| path.get(*param).map(|raw| (field, raw)))
            .map(|(field, raw)| -> AppResult<Condition> {
                Ok(Condition::eq(field, parse_id(raw)?.to_string()))
            })
            .collect()
    }

    /// Present and expand stored documents
    pub async fn finish(&self, docs: Vec<Value>) -> AppResult<Vec<Value>> {
        let mut docs: Vec<Value> = docs.into_iter().map(T::present).collect();
        for expansion in &self.expansions {
            expansion.apply_all(&mut docs).await?;
        }
        Ok(docs)
    }

    // === Operations ===

    pub async fn get_all(
        &self,
        path: &HashMap<String, String>,
        params: &QueryParams,
    ) -> AppResult<Vec<Value>> {
        let base = QuerySpec::filtered(self.ancestor_filter(path)?);
        let spec = QueryFeatures::new(base, params)
            .filter()
            .sort()
            .limit_fields()
            .paginate()
            .into_spec();

        let docs = self.service.find_many(&spec).await?;
        self.finish(docs).await
    }

    pub async fn get_one(&self, id: &str) -> AppResult<Value> {
        let uuid = parse_id(id)?;
        let entity = self
            .service
            .find_by_id(&uuid)
            .await?
            .ok_or_else(|| AppError::not_found(T::resource_name_singular(), id))?;

        let mut doc = entity.output()?;
        for expansion in self.expansions.iter().chain(&self.detail_expansions) {
            expansion.apply(&mut doc).await?;
        }
        Ok(doc)
    }

    pub async fn create_one(&self, payload: Value) -> AppResult<T> {
        let entity = T::from_payload(payload)?;
        self.service.create(entity).await
    }

    pub async fn update_one(&self, id: &str, patch: Value) -> AppResult<T> {
        let uuid = parse_id(id)?;
        self.service
            .update_by_id(&uuid, writable_patch::<T>(patch)?)
            .await?
            .ok_or_else(|| AppError::not_found(T::resource_name_singular(), id))
    }

    pub async fn delete_one(&self, id: &str) -> AppResult<()> {
        let uuid = parse_id(id)?;
        self.service
            .delete_by_id(&uuid)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(T::resource_name_singular(), id))
    }
}

// =============================================================================
// Envelopes
// =============================================================================

pub fn list_envelope(docs: Vec<Value>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "results": docs.len(),
        "data": { "data": docs }
    }))
}

pub fn document_envelope(doc: Value) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": { "data": doc }
    }))
}

// =============================================================================
// Axum handlers
// =============================================================================

pub async fn list<T: Entity>(
    State(resource): State<Resource<T>>,
    path: Option<Path<HashMap<String, String>>>,
    ApiQuery(params): ApiQuery,
) -> AppResult<Json<Value>> {
    let path = path.map(|Path(p)| p).unwrap_or_default();
    let docs = resource.get_all(&path, &params).await?;
    Ok(list_envelope(docs))
}

pub async fn get_one<T: Entity>(
    State(resource): State<Resource<T>>,
    TargetId(id): TargetId,
) -> AppResult<Json<Value>> {
    Ok(document_envelope(resource.get_one(&id).await?))
}

pub async fn create_one<T: Entity>(
    State(resource): State<Resource<T>>,
    JsonBody(payload): JsonBody<Value>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let created = resource.create_one(payload).await?;
    Ok((StatusCode::CREATED, document_envelope(created.output()?)))
}

pub async fn update_one<T: Entity>(
    State(resource): State<Resource<T>>,
    TargetId(id): TargetId,
    JsonBody(patch): JsonBody<Value>,
) -> AppResult<Json<Value>> {
    let updated = resource.update_one(&id, patch).await?;
    Ok(document_envelope(updated.output()?))
}

pub async fn delete_one<T: Entity>(
    State(resource): State<Resource<T>>,
    TargetId(id): TargetId,
) -> AppResult<StatusCode> {
    resource.delete_one(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
