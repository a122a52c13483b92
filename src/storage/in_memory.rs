//! In-memory implementation of DataService for testing and development
//!
//! Documents are kept as JSON values in insertion order. Queries are
//! evaluated with the same loose typing a document store applies to
//! query-string input: `"500"` matches a stored `500`, comparisons between
//! incompatible types never match, and a condition on an array field matches
//! when any element does.

use crate::core::entity::Entity;
use crate::core::error::{AppResult, StorageError};
use crate::core::query::{Condition, Predicate, Projection, QuerySpec, SortKey, VERSION_KEY};
use crate::core::service::DataService;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

const BACKEND: &str = "in-memory";

/// In-memory data service implementation
///
/// Useful for testing and development. Uses RwLock for thread-safe access;
/// clones share the same documents.
#[derive(Clone)]
pub struct InMemoryDataService<T> {
    documents: Arc<RwLock<IndexMap<Uuid, Value>>>,
    _marker: PhantomData<T>,
}

impl<T> InMemoryDataService<T> {
    /// Create a new, empty in-memory service
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(IndexMap::new())),
            _marker: PhantomData,
        }
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, IndexMap<Uuid, Value>>> {
        self.documents.read().map_err(|e| {
            StorageError::backend(BACKEND, format!("Failed to acquire read lock: {}", e)).into()
        })
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, IndexMap<Uuid, Value>>> {
        self.documents.write().map_err(|e| {
            StorageError::backend(BACKEND, format!("Failed to acquire write lock: {}", e)).into()
        })
    }
}

impl<T> Default for InMemoryDataService<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> InMemoryDataService<T> {
    fn visible(doc: &Value) -> bool {
        T::base_filter().iter().all(|c| matches(doc, c))
    }

    /// Fail when another document already holds one of `T`'s unique keys
    fn check_unique(
        documents: &IndexMap<Uuid, Value>,
        id: &Uuid,
        candidate: &Value,
    ) -> AppResult<()> {
        for key in T::unique_keys() {
            let values: Vec<&Value> = key
                .iter()
                .map(|field| candidate.get(*field).unwrap_or(&Value::Null))
                .collect();
            if values.iter().any(|v| v.is_null()) {
                continue;
            }

            let taken = documents.iter().any(|(other_id, doc)| {
                other_id != id
                    && key
                        .iter()
                        .zip(&values)
                        .all(|(field, value)| doc.get(*field) == Some(*value))
            });

            if taken {
                return Err(StorageError::Duplicate {
                    fields: key.iter().map(|f| f.to_string()).collect(),
                    value: values
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                }
                .into());
            }
        }
        Ok(())
    }

    fn stored(entity: &T, version: Value) -> AppResult<Value> {
        let mut doc = entity.to_document()?;
        if let Value::Object(fields) = &mut doc {
            fields.insert(VERSION_KEY.to_string(), version);
        }
        Ok(doc)
    }
}

#[async_trait]
impl<T: Entity> DataService<T> for InMemoryDataService<T> {
    async fn find_many(&self, spec: &QuerySpec) -> AppResult<Vec<Value>> {
        let documents = self.read()?;

        let mut found: Vec<Value> = documents
            .values()
            .filter(|doc| Self::visible(doc) && spec.filter.iter().all(|c| matches(doc, c)))
            .cloned()
            .collect();
        drop(documents);

        sort_documents(&mut found, &spec.sort);

        let skip = usize::try_from(spec.skip).unwrap_or(usize::MAX);
        let limit = spec
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(found
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| project(doc, &spec.projection))
            .collect())
    }

    async fn find_by_id(&self, id: &Uuid) -> AppResult<Option<T>> {
        let documents = self.read()?;

        match documents.get(id) {
            Some(doc) if Self::visible(doc) => Ok(Some(T::from_document(doc.clone())?)),
            _ => Ok(None),
        }
    }

    async fn create(&self, entity: T) -> AppResult<T> {
        let mut documents = self.write()?;
        let id = entity.id();

        if documents.contains_key(&id) {
            return Err(StorageError::Duplicate {
                fields: vec!["id".to_string()],
                value: format!("\"{}\"", id),
            }
            .into());
        }

        let doc = Self::stored(&entity, Value::from(0))?;
        Self::check_unique(&documents, &id, &doc)?;
        documents.insert(id, doc);

        Ok(entity)
    }

    async fn update_by_id(&self, id: &Uuid, patch: Value) -> AppResult<Option<T>> {
        let mut documents = self.write()?;

        let Some(current) = documents.get(id).filter(|doc| Self::visible(doc)) else {
            return Ok(None);
        };
        let version = current.get(VERSION_KEY).cloned().unwrap_or(Value::from(0));

        let updated = T::from_document(current.clone())?.apply_patch(patch)?;
        let doc = Self::stored(&updated, version)?;
        Self::check_unique(&documents, id, &doc)?;
        documents.insert(*id, doc);

        Ok(Some(updated))
    }

    async fn delete_by_id(&self, id: &Uuid) -> AppResult<Option<T>> {
        let mut documents = self.write()?;

        if !documents.get(id).is_some_and(|doc| Self::visible(doc)) {
            return Ok(None);
        }
        match documents.shift_remove(id) {
            Some(doc) => Ok(Some(T::from_document(doc)?)),
            None => Ok(None),
        }
    }
}

// =============================================================================
// Query evaluation
// =============================================================================

/// Whether `doc` satisfies `condition`
pub fn matches(doc: &Value, condition: &Condition) -> bool {
    let stored = doc.get(&condition.field).unwrap_or(&Value::Null);

    match &condition.predicate {
        Predicate::Eq(wanted) => equals(stored, wanted),
        Predicate::Ne(wanted) => !equals(stored, wanted),
        Predicate::In(values) => values.iter().any(|wanted| equals(stored, wanted)),
        Predicate::Cmp(comparison, operand) => {
            let accepts = |value: &Value| {
                compare(value, operand).is_some_and(|ordering| comparison.accepts(ordering))
            };
            match stored {
                Value::Array(items) => items.iter().any(accepts),
                other => accepts(other),
            }
        }
    }
}

fn equals(stored: &Value, wanted: &Value) -> bool {
    match stored {
        Value::Array(items) if !wanted.is_array() => {
            items.iter().any(|item| loose_eq(item, wanted))
        }
        _ => loose_eq(stored, wanted),
    }
}

fn loose_eq(stored: &Value, wanted: &Value) -> bool {
    if stored == wanted {
        return true;
    }
    match (stored, wanted) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.parse::<f64>().ok() == n.as_f64()
        }
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            s == if *b { "true" } else { "false" }
        }
        _ => false,
    }
}

/// Order of a stored value relative to a query operand; `None` when the
/// types cannot be compared
fn compare(stored: &Value, operand: &Value) -> Option<Ordering> {
    match (stored, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::String(b)) => a.as_f64()?.partial_cmp(&b.parse::<f64>().ok()?),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn sort_documents(docs: &mut [Value], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for key in keys {
            let ordering = sort_order(a.get(&key.field), b.get(&key.field));
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn project(doc: Value, projection: &Projection) -> Value {
    let Value::Object(fields) = doc else {
        return doc;
    };

    let fields: Map<String, Value> = match projection {
        Projection::All => fields,
        Projection::Include(keep) => fields
            .into_iter()
            .filter(|(key, _)| key == "id" || keep.iter().any(|k| k == key))
            .collect(),
        Projection::Exclude(drop) => fields
            .into_iter()
            .filter(|(key, _)| !drop.iter().any(|d| d == key))
            .collect(),
    };
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::{Comparison, QueryFeatures, QueryParams};
    use crate::entities::tour::Tour;
    use serde_json::json;

    fn tour_payload(name: &str, difficulty: &str, price: f64) -> Value {
        json!({
            "name": name,
            "duration": 5,
            "maxGroupSize": 10,
            "difficulty": difficulty,
            "price": price,
            "summary": "A tour used in tests",
            "imageCover": "cover.jpg"
        })
    }

    async fn seeded(count: usize) -> InMemoryDataService<Tour> {
        let service = InMemoryDataService::<Tour>::new();
        for i in 0..count {
            let difficulty = if i % 2 == 0 { "easy" } else { "medium" };
            let tour = Tour::from_payload(tour_payload(
                &format!("Test Tour Number {:02}", i),
                difficulty,
                100.0 * (i as f64 + 1.0),
            ))
            .unwrap();
            service.create(tour).await.unwrap();
        }
        service
    }

    #[test]
    fn test_loose_matching() {
        let doc = json!({"price": 500, "secretTour": false, "guides": ["a", "b"], "name": "x"});
        assert!(matches(&doc, &Condition::eq("price", "500")));
        assert!(matches(&doc, &Condition::eq("guides", "b")));
        assert!(matches(&doc, &Condition::ne("secretTour", true)));
        assert!(matches(&doc, &Condition::ne("missing", true)));
        assert!(matches(&doc, &Condition::cmp("price", Comparison::Gte, 500)));
        assert!(!matches(&doc, &Condition::cmp("price", Comparison::Gt, 500)));
        assert!(!matches(&doc, &Condition::cmp("name", Comparison::Gt, 5)));
    }

    #[tokio::test]
    async fn test_example_query_over_twelve_tours() {
        let service = seeded(12).await;
        let params = QueryParams::from_pairs([
            ("difficulty", "easy".to_string()),
            ("sort", "-price".to_string()),
            ("limit", "2".to_string()),
            ("page", "2".to_string()),
        ])
        .unwrap();
        let spec = QueryFeatures::new(QuerySpec::default(), &params)
            .filter()
            .sort()
            .limit_fields()
            .paginate()
            .into_spec();

        let docs = service.find_many(&spec).await.unwrap();
        let prices: Vec<f64> = docs.iter().map(|d| d["price"].as_f64().unwrap()).collect();
        // easy tours cost 100, 300, ..., 1100; page 2 of size 2 in descending order
        assert_eq!(prices, vec![700.0, 500.0]);
        assert!(docs.iter().all(|d| d.get("__v").is_none()));
    }

    #[tokio::test]
    async fn test_secret_tours_are_invisible() {
        let service = seeded(1).await;
        let mut body = tour_payload("The Secret Mountain", "easy", 10.0);
        body["secretTour"] = json!(true);
        let secret = service.create(Tour::from_payload(body).unwrap()).await.unwrap();

        assert!(service.find_by_id(&secret.id).await.unwrap().is_none());
        assert_eq!(service.find_all(vec![]).await.unwrap().len(), 1);
        assert!(service.delete_by_id(&secret.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_name_enforced_on_create_and_update() {
        let service = seeded(2).await;
        let dup = Tour::from_payload(tour_payload("Test Tour Number 00", "easy", 1.0)).unwrap();
        let err = service.create(dup).await.unwrap_err();
        assert!(err.to_string().contains("Duplicate field value"));

        let second = service
            .find_one(vec![Condition::eq("name", "Test Tour Number 01")])
            .await
            .unwrap()
            .unwrap();
        let err = service
            .update_by_id(&second.id, json!({"name": "Test Tour Number 00"}))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_projection_keeps_id() {
        let service = seeded(1).await;
        let spec = QuerySpec::default().project(Projection::Include(vec!["name".into()]));
        let docs = service.find_many(&spec).await.unwrap();
        let keys: Vec<&String> = docs[0].as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert!(docs[0].get("id").is_some());
    }
}
