//! Related-document expansion
//!
//! An [`Expansion`] replaces stored ids with the documents they point to, or
//! attaches the documents that point back at the current one:
//!
//! - `Expansion::reference("guides", users)` turns `"guides": [id, ...]` into
//!   `"guides": [{...}, ...]`
//! - `Expansion::reverse("reviews", "tour", reviews)` adds
//!   `"reviews": [...]` holding every review whose `tour` equals this id

use crate::core::entity::Entity;
use crate::core::error::AppResult;
use crate::core::query::{Condition, Projection, QuerySpec};
use crate::core::service::DataService;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Read-only access to presented documents of some entity type
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn documents(&self, spec: &QuerySpec) -> AppResult<Vec<Value>>;
}

struct ServiceSource<T: Entity> {
    service: Arc<dyn DataService<T>>,
    expansions: Vec<Expansion>,
}

#[async_trait]
impl<T: Entity> DocumentSource for ServiceSource<T> {
    async fn documents(&self, spec: &QuerySpec) -> AppResult<Vec<Value>> {
        let mut docs: Vec<Value> = self
            .service
            .find_many(spec)
            .await?
            .into_iter()
            .map(T::present)
            .collect();
        for expansion in &self.expansions {
            expansion.apply_all(&mut docs).await?;
        }
        Ok(docs)
    }
}

#[derive(Clone)]
enum Kind {
    Reference { field: &'static str },
    Reverse { as_field: &'static str, foreign_field: &'static str },
}

/// One populate instruction
#[derive(Clone)]
pub struct Expansion {
    kind: Kind,
    source: Arc<dyn DocumentSource>,
    projection: Projection,
}

impl Expansion {
    /// Replace the id (or ids) stored in `field` with the referenced documents
    pub fn reference<T: Entity>(field: &'static str, service: Arc<dyn DataService<T>>) -> Self {
        Self {
            kind: Kind::Reference { field },
            source: Arc::new(ServiceSource {
                service,
                expansions: Vec::new(),
            }),
            projection: Projection::All,
        }
    }

    /// Attach every document whose `foreign_field` equals this document's id
    pub fn reverse<T: Entity>(
        as_field: &'static str,
        foreign_field: &'static str,
        service: Arc<dyn DataService<T>>,
    ) -> Self {
        Self {
            kind: Kind::Reverse {
                as_field,
                foreign_field,
            },
            source: Arc::new(ServiceSource {
                service,
                expansions: Vec::new(),
            }),
            projection: Projection::All,
        }
    }

    /// Only bring back these fields of the related documents
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.projection = Projection::Include(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Expand the related documents themselves before attaching them
    pub fn nested<T: Entity>(
        mut self,
        service: Arc<dyn DataService<T>>,
        expansions: Vec<Expansion>,
    ) -> Self {
        self.source = Arc::new(ServiceSource {
            service,
            expansions,
        });
        self
    }

    fn spec(&self, condition: Condition) -> QuerySpec {
        QuerySpec::filtered(vec![condition]).project(self.projection.clone())
    }

    pub async fn apply_all(&self, docs: &mut [Value]) -> AppResult<()> {
        for doc in docs.iter_mut() {
            self.apply(doc).await?;
        }
        Ok(())
    }

    pub async fn apply(&self, doc: &mut Value) -> AppResult<()> {
        let Value::Object(fields) = doc else {
            return Ok(());
        };

        match &self.kind {
            Kind::Reference { field } => {
                let Some(stored) = fields.get(*field).cloned() else {
                    return Ok(());
                };
                let expanded = match stored {
                    Value::Array(ids) => {
                        if ids.is_empty() {
                            return Ok(());
                        }
                        let related = self
                            .source
                            .documents(&self.spec(Condition::is_in("id", ids.clone())))
                            .await?;
                        // keep the stored order; drop dangling ids
                        Value::Array(
                            ids.iter()
                                .filter_map(|id| {
                                    related.iter().find(|d| d.get("id") == Some(id)).cloned()
                                })
                                .collect(),
                        )
                    }
                    Value::Null => Value::Null,
                    id => self
                        .source
                        .documents(&self.spec(Condition::eq("id", id)))
                        .await?
                        .into_iter()
                        .next()
                        .unwrap_or(Value::Null),
                };
                fields.insert(field.to_string(), expanded);
            }
            Kind::Reverse {
                as_field,
                foreign_field,
            } => {
                let Some(id) = fields.get("id").cloned() else {
                    return Ok(());
                };
                let related = self
                    .source
                    .documents(&self.spec(Condition::eq(foreign_field, id)))
                    .await?;
                fields.insert(as_field.to_string(), Value::Array(related));
            }
        }

        Ok(())
    }
}
