//! MongoDB storage backend using the official MongoDB async driver.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag.
//!
//! # Storage model
//!
//! Each `MongoDataService<T>` operates on a collection named after
//! `T::resource_name()` ("tours", "users", ...).
//!
//! # Serialization strategy
//!
//! Entities are serialized via `serde_json::Value` as an intermediate format,
//! then converted to BSON documents. UUIDs and timestamps are stored as
//! strings; the `id` field is mapped to MongoDB's `_id` convention. Every
//! document carries a `__v` version key that projections hide by default.

use crate::core::entity::Entity;
use crate::core::error::{AppError, AppResult, StorageError};
use crate::core::query::{Condition, Predicate, Projection, QuerySpec, SortKey, VERSION_KEY};
use crate::core::service::DataService;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Database, IndexModel};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use uuid::Uuid;

const BACKEND: &str = "mongodb";
const DUPLICATE_KEY: i32 = 11000;

static QUOTED_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(["'])(\\?.)*?\1"#).expect("static quoted value pattern"));

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Convert a serde_json::Value (expected to be an Object) into a BSON Document,
/// renaming `id` → `_id` for MongoDB convention.
fn json_to_document(json: &Value) -> AppResult<Document> {
    let bson_val = mongodb::bson::to_bson(json).map_err(|e| {
        StorageError::backend(BACKEND, format!("Failed to convert JSON to BSON: {}", e))
    })?;

    let mut doc = match bson_val {
        Bson::Document(d) => d,
        _ => {
            return Err(StorageError::backend(BACKEND, "Expected BSON document, got non-object").into());
        }
    };

    if let Some(id) = doc.remove("id") {
        doc.insert("_id", id);
    }

    Ok(doc)
}

/// Convert a BSON Document back into a serde_json::Value,
/// renaming `_id` → `id` for domain entity convention.
fn document_to_json(mut doc: Document) -> Value {
    if let Some(id) = doc.remove("_id") {
        doc.insert("id", id);
    }

    Bson::Document(doc).into_relaxed_extjson()
}

fn uuid_bson(id: &Uuid) -> Bson {
    Bson::String(id.to_string())
}

fn field_name(field: &str) -> &str {
    if field == "id" { "_id" } else { field }
}

fn to_bson(value: &Value) -> AppResult<Bson> {
    mongodb::bson::to_bson(value).map_err(|e| {
        StorageError::backend(BACKEND, format!("Failed to convert query value: {}", e)).into()
    })
}

/// BSON values a query-string value should match.
///
/// Values taken from a URL arrive as strings while documents store native
/// types, so `"25"` matches both the string and the integer 25.
fn variants(value: &Value) -> AppResult<Vec<Bson>> {
    let Value::String(raw) = value else {
        return Ok(vec![to_bson(value)?]);
    };

    let mut variants = vec![Bson::String(raw.clone())];
    match raw.as_str() {
        "true" => variants.push(Bson::Boolean(true)),
        "false" => variants.push(Bson::Boolean(false)),
        _ => {
            if let Ok(i) = raw.parse::<i64>() {
                variants.push(Bson::Int64(i));
            }
            if let Ok(f) = raw.parse::<f64>() {
                variants.push(Bson::Double(f));
            }
        }
    }
    Ok(variants)
}

/// Operand for an ordering comparison; numeric strings compare as numbers
fn comparison_operand(value: &Value) -> AppResult<Bson> {
    match value {
        Value::String(raw) => Ok(raw
            .parse::<f64>()
            .map(Bson::Double)
            .unwrap_or_else(|_| Bson::String(raw.clone()))),
        other => to_bson(other),
    }
}

fn condition_document(condition: &Condition) -> AppResult<Document> {
    let field = field_name(&condition.field);

    let filter = match &condition.predicate {
        Predicate::Eq(Value::Null) => doc! { field: Bson::Null },
        Predicate::Eq(value) => doc! { field: { "$in": variants(value)? } },
        Predicate::Ne(value) => doc! { field: { "$nin": variants(value)? } },
        Predicate::In(values) => {
            let mut all = Vec::new();
            for value in values {
                all.extend(variants(value)?);
            }
            doc! { field: { "$in": all } }
        }
        Predicate::Cmp(comparison, value) => {
            doc! { field: { comparison.operator(): comparison_operand(value)? } }
        }
    };
    Ok(filter)
}

/// Combine conditions into one filter document
fn filter_document<'a>(conditions: impl IntoIterator<Item = &'a Condition>) -> AppResult<Document> {
    let mut parts = conditions
        .into_iter()
        .map(condition_document)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(match parts.len() {
        0 => Document::new(),
        1 => parts.remove(0),
        _ => doc! { "$and": parts },
    })
}

fn sort_document(keys: &[SortKey]) -> Document {
    let mut sort = Document::new();
    for key in keys {
        sort.insert(field_name(&key.field), if key.descending { -1 } else { 1 });
    }
    sort
}

fn projection_document(projection: &Projection) -> Option<Document> {
    let (fields, flag) = match projection {
        Projection::All => return None,
        Projection::Include(fields) => (fields, 1),
        Projection::Exclude(fields) => (fields, 0),
    };
    let mut doc = Document::new();
    for field in fields {
        doc.insert(field_name(field), flag);
    }
    Some(doc)
}

/// `$set`/`$unset` update turning `before` into `after`, ignoring `_id` and `__v`
fn update_document(before: &Document, after: &Document) -> Document {
    fn tracked(key: &str) -> bool {
        key != "_id" && key != VERSION_KEY
    }

    let mut set = Document::new();
    for (key, value) in after {
        if tracked(key) && before.get(key) != Some(value) {
            set.insert(key.clone(), value.clone());
        }
    }
    let mut unset = Document::new();
    for key in before.keys() {
        if tracked(key) && !after.contains_key(key) {
            unset.insert(key.clone(), "");
        }
    }

    let mut update = Document::new();
    if !set.is_empty() {
        update.insert("$set", set);
    }
    if !unset.is_empty() {
        update.insert("$unset", unset);
    }
    update
}

fn index_name(fields: &[&str]) -> String {
    format!("{}_unique", fields.join("_"))
}

// ---------------------------------------------------------------------------
// MongoDataService<T>
// ---------------------------------------------------------------------------

/// Generic data storage service backed by MongoDB.
///
/// # Example
///
/// ```rust,ignore
/// use mongodb::Client;
/// use tourbook::storage::MongoDataService;
///
/// let client = Client::with_uri_str("mongodb://localhost:27017").await?;
/// let service = MongoDataService::<Tour>::new(client.database("natours"));
/// service.ensure_indexes().await?;
/// ```
#[derive(Clone, Debug)]
pub struct MongoDataService<T> {
    database: Database,
    _marker: std::marker::PhantomData<T>,
}

impl<T> MongoDataService<T> {
    /// Create a new `MongoDataService` with the given database handle.
    pub fn new(database: Database) -> Self {
        Self {
            database,
            _marker: std::marker::PhantomData,
        }
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }
}

impl<T: Entity> MongoDataService<T> {
    fn collection(&self) -> mongodb::Collection<Document> {
        self.database.collection(T::resource_name())
    }

    /// Create one unique index per entry of `T::unique_keys()`.
    ///
    /// Idempotent; safe to call on every startup.
    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let indexes: Vec<IndexModel> = T::unique_keys()
            .iter()
            .map(|fields| {
                let mut keys = Document::new();
                for field in fields.iter() {
                    keys.insert(*field, 1);
                }
                IndexModel::builder()
                    .keys(keys)
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name(index_name(fields))
                            .build(),
                    )
                    .build()
            })
            .collect();

        if indexes.is_empty() {
            return Ok(());
        }

        self.collection()
            .create_indexes(indexes)
            .await
            .map_err(|e| {
                StorageError::backend(
                    BACKEND,
                    format!("Failed to create indexes on {}: {}", T::resource_name(), e),
                )
            })?;
        Ok(())
    }

    /// Create a plain (non-unique) index to speed up common sorts and filters
    pub async fn create_index(&self, keys: Document) -> AppResult<()> {
        self.collection()
            .create_index(IndexModel::builder().keys(keys).build())
            .await
            .map_err(|e| {
                StorageError::backend(
                    BACKEND,
                    format!("Failed to create index on {}: {}", T::resource_name(), e),
                )
            })?;
        Ok(())
    }

    fn scoped(&self, extra: Vec<Condition>) -> AppResult<Document> {
        let mut conditions = T::base_filter();
        conditions.extend(extra);
        filter_document(&conditions)
    }

    fn by_id(&self, id: &Uuid) -> AppResult<Document> {
        let mut filter = self.scoped(Vec::new())?;
        filter.insert("_id", uuid_bson(id));
        Ok(filter)
    }

    fn stored(entity: &T, version: Bson) -> AppResult<Document> {
        let mut doc = json_to_document(&entity.to_document()?)?;
        doc.insert(VERSION_KEY, version);
        Ok(doc)
    }

    /// Translate a driver error, recognizing unique-index violations
    fn write_error(&self, candidate: &Document, err: mongodb::error::Error) -> AppError {
        let duplicate = match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
            ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
            _ => false,
        };
        if !duplicate {
            return StorageError::backend(BACKEND, format!("Failed to write document: {}", err)).into();
        }

        let message = err.to_string();
        for fields in T::unique_keys() {
            if message.contains(&index_name(fields)) {
                let value = fields
                    .iter()
                    .map(|f| {
                        candidate
                            .get(*f)
                            .cloned()
                            .map(|b| b.into_relaxed_extjson().to_string())
                            .unwrap_or_default()
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                return StorageError::Duplicate {
                    fields: fields.iter().map(|f| f.to_string()).collect(),
                    value,
                }
                .into();
            }
        }

        StorageError::Duplicate {
            fields: Vec::new(),
            value: QUOTED_VALUE
                .find(&message)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        }
        .into()
    }
}

#[async_trait]
impl<T: Entity> DataService<T> for MongoDataService<T> {
    async fn find_many(&self, spec: &QuerySpec) -> AppResult<Vec<Value>> {
        let filter = self.scoped(spec.filter.clone())?;

        let mut find = self.collection().find(filter).skip(spec.skip);
        if !spec.sort.is_empty() {
            find = find.sort(sort_document(&spec.sort));
        }
        if let Some(projection) = projection_document(&spec.projection) {
            find = find.projection(projection);
        }
        if let Some(limit) = spec.limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let cursor = find.await.map_err(|e| {
            StorageError::backend(BACKEND, format!("Failed to query {}: {}", T::resource_name(), e))
        })?;

        let docs: Vec<Document> = cursor.try_collect().await.map_err(|e| {
            StorageError::backend(BACKEND, format!("Failed to collect documents: {}", e))
        })?;

        Ok(docs.into_iter().map(document_to_json).collect())
    }

    async fn find_by_id(&self, id: &Uuid) -> AppResult<Option<T>> {
        let doc = self
            .collection()
            .find_one(self.by_id(id)?)
            .await
            .map_err(|e| StorageError::backend(BACKEND, format!("Failed to get document: {}", e)))?;

        doc.map(|d| T::from_document(document_to_json(d))).transpose()
    }

    async fn create(&self, entity: T) -> AppResult<T> {
        let doc = Self::stored(&entity, Bson::Int32(0))?;

        self.collection()
            .insert_one(doc.clone())
            .await
            .map_err(|e| self.write_error(&doc, e))?;

        Ok(entity)
    }

    async fn update_by_id(&self, id: &Uuid, patch: Value) -> AppResult<Option<T>> {
        let Some(current) = self
            .collection()
            .find_one(self.by_id(id)?)
            .await
            .map_err(|e| StorageError::backend(BACKEND, format!("Failed to get document: {}", e)))?
        else {
            return Ok(None);
        };

        let version = current.get(VERSION_KEY).cloned().unwrap_or(Bson::Int32(0));
        let updated = T::from_document(document_to_json(current.clone()))?.apply_patch(patch)?;
        let doc = Self::stored(&updated, version)?;

        // write only what changed; other fields may have moved on since the read
        let changes = update_document(&current, &doc);
        if changes.is_empty() {
            return Ok(Some(updated));
        }

        let stored = self
            .collection()
            .find_one_and_update(self.by_id(id)?, changes)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| self.write_error(&doc, e))?;

        stored.map(|d| T::from_document(document_to_json(d))).transpose()
    }

    async fn delete_by_id(&self, id: &Uuid) -> AppResult<Option<T>> {
        let removed = self
            .collection()
            .find_one_and_delete(self.by_id(id)?)
            .await
            .map_err(|e| {
                StorageError::backend(BACKEND, format!("Failed to delete document: {}", e))
            })?;

        removed.map(|d| T::from_document(document_to_json(d))).transpose()
    }
}
