//! Entity trait defining the core abstraction for all resource types

use crate::core::error::{AppError, AppResult, FieldValidationError, RequestError, ValidationError};
use crate::core::query::{Condition, is_safe_key};
use crate::core::timestamp;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt::Debug;
use uuid::Uuid;
use validator::Validate;

/// Base trait for every persisted resource.
///
/// Entities travel as camelCase JSON documents with a string `id`. The trait
/// carries the schema-level rules the storage backends and the handler factory
/// need: required fields with their messages, unique keys, fields that never
/// leave the server, and the implicit filter every find applies.
pub trait Entity:
    Clone + Debug + Serialize + DeserializeOwned + Validate + Send + Sync + 'static
{
    /// The plural resource name used for collections and URLs (e.g., "tours")
    fn resource_name() -> &'static str;

    /// The singular resource name (e.g., "tour")
    fn resource_name_singular() -> &'static str;

    /// Get the unique identifier for this entity instance
    fn id(&self) -> Uuid;

    /// `(field, message)` pairs checked before deserializing a payload
    fn required_fields() -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Fields assigned by the server and never taken from a payload
    fn immutable_fields() -> &'static [&'static str] {
        &["id", "createdAt"]
    }

    /// Fields only server code may write (passwords, flags)
    fn protected_fields() -> &'static [&'static str] {
        &[]
    }

    /// Fields stripped from every response
    fn hidden_fields() -> &'static [&'static str] {
        &[]
    }

    /// Field groups whose combined value must be unique
    fn unique_keys() -> &'static [&'static [&'static str]] {
        &[]
    }

    /// Conditions every find applies implicitly
    fn base_filter() -> Vec<Condition> {
        Vec::new()
    }

    /// Normalize and derive values before validation
    fn prepare(&mut self) {}

    /// Add computed fields to an outgoing document
    fn add_virtuals(_doc: &mut Map<String, Value>) {}

    // === Provided ===

    /// Build a new entity from a client payload.
    ///
    /// Assigns `id` and `createdAt`, ignores server-owned fields, then
    /// validates.
    fn from_payload(payload: Value) -> AppResult<Self> {
        let mut fields = into_object(payload)?;

        for key in Self::immutable_fields().iter().chain(Self::protected_fields()) {
            fields.remove(*key);
        }

        let missing: Vec<FieldValidationError> = Self::required_fields()
            .iter()
            .filter(|(field, _)| fields.get(*field).is_none_or(Value::is_null))
            .map(|(field, message)| FieldValidationError::new(*field, *message))
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::FieldErrors(missing).into());
        }

        fields.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        fields.insert(
            "createdAt".into(),
            Value::String(timestamp::format(&Utc::now())),
        );

        let mut entity: Self = serde_json::from_value(Value::Object(fields))?;
        entity.prepare();
        entity.validate()?;
        Ok(entity)
    }

    /// Apply a partial update on top of this entity and re-validate
    fn apply_patch(&self, patch: Value) -> AppResult<Self> {
        let changes = into_object(patch)?;
        let mut fields = into_object(self.to_document()?)?;

        for (key, value) in changes {
            if Self::immutable_fields().contains(&key.as_str()) {
                continue;
            }
            fields.insert(key, value);
        }

        let mut entity: Self = serde_json::from_value(Value::Object(fields))?;
        entity.prepare();
        entity.validate()?;
        Ok(entity)
    }

    /// Serialize to the stored document shape
    fn to_document(&self) -> AppResult<Value> {
        serde_json::to_value(self).map_err(|e| {
            AppError::Internal(format!(
                "failed to serialize {}: {}",
                Self::resource_name_singular(),
                e
            ))
        })
    }

    /// Deserialize a stored document
    fn from_document(doc: Value) -> AppResult<Self> {
        serde_json::from_value(doc).map_err(|e| {
            AppError::Internal(format!(
                "stored {} is unreadable: {}",
                Self::resource_name_singular(),
                e
            ))
        })
    }

    /// Shape a stored (possibly projected) document for output
    fn present(doc: Value) -> Value {
        match doc {
            Value::Object(mut fields) => {
                for key in Self::hidden_fields() {
                    fields.remove(*key);
                }
                Self::add_virtuals(&mut fields);
                Value::Object(fields)
            }
            other => other,
        }
    }

    /// Output form of this entity
    fn output(&self) -> AppResult<Value> {
        Ok(Self::present(self.to_document()?))
    }
}

/// Remove server-owned and protected keys from a client update
pub fn writable_patch<T: Entity>(patch: Value) -> AppResult<Value> {
    let mut fields = into_object(patch)?;
    for key in T::immutable_fields().iter().chain(T::protected_fields()) {
        fields.remove(*key);
    }
    Ok(Value::Object(fields))
}

/// Drop keys that start with `$` or contain `.`, at any depth
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .filter(|(key, _)| is_safe_key(key))
                .map(|(key, value)| (key, sanitize(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        other => other,
    }
}

fn into_object(value: Value) -> AppResult<Map<String, Value>> {
    match value {
        Value::Object(fields) => Ok(fields),
        _ => Err(RequestError::Rejected {
            status: axum::http::StatusCode::BAD_REQUEST,
            message: "Request body must be a JSON object".to_string(),
        }
        .into()),
    }
}

/// Parse an id path segment
pub fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| {
        ValidationError::InvalidId {
            field: "_id".to_string(),
            value: raw.to_string(),
        }
        .into()
    })
}
