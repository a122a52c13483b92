//! Macro-generated test suite for `DataService<Tour>` contract validation.
//!
//! The `data_service_tests!` macro generates a test module that validates
//! any `DataService<Tour>` implementation: CRUD, query specs (filters,
//! sorting, projection, pagination), the implicit secret-tour filter,
//! unique keys and concurrent access.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//!
//! use storage_harness::*;
//! use tourbook::storage::InMemoryDataService;
//!
//! data_service_tests!(InMemoryDataService::<Tour>::new());
//! ```

/// Generate a full `DataService<Tour>` conformance test suite.
///
/// `$factory` must be an expression that evaluates to an instance implementing
/// `DataService<Tour>`. It is re-evaluated for each test to ensure isolation.
/// For the concurrent access test, the returned service must also implement
/// `Clone + 'static`.
#[macro_export]
macro_rules! data_service_tests {
    ($factory:expr) => {
        mod data_service_contract_tests {
            use super::*;
            use serde_json::{Value, json};
            use tourbook::core::entity::Entity;
            use tourbook::core::error::{AppError, StorageError};
            use tourbook::core::query::{
                Comparison, Condition, Projection, QuerySpec, SortKey,
            };
            use tourbook::core::service::DataService;
            use tourbook::entities::Tour;
            use uuid::Uuid;

            async fn seeded<S: DataService<Tour>>(service: &S) -> Vec<Tour> {
                let mut created = Vec::new();
                for tour in seed_tours() {
                    created.push(service.create(tour).await.unwrap());
                }
                created
            }

            fn names(docs: &[Value]) -> Vec<String> {
                docs.iter()
                    .map(|d| d["name"].as_str().unwrap_or_default().to_string())
                    .collect()
            }

            // ==================================================================
            // CRUD
            // ==================================================================

            #[tokio::test]
            async fn test_create_and_find_by_id() {
                let service = $factory;
                let tour = create_test_tour("The Forest Hiker", 397.0, "easy");
                let id = tour.id;

                let created = service.create(tour).await.unwrap();
                assert_eq!(created.id(), id);
                assert_eq!(created.slug, "the-forest-hiker");

                let found = service.find_by_id(&id).await.unwrap().expect("stored tour");
                assert_eq!(found.name, "The Forest Hiker");
                assert_eq!(found.price, 397.0);
                assert_eq!(found.start_dates.len(), 2);
                assert_eq!(
                    found.start_location.and_then(|l| l.lat_lng()),
                    Some((25.774772, -80.185942))
                );
            }

            #[tokio::test]
            async fn test_find_by_id_nonexistent() {
                let service = $factory;
                assert!(service.find_by_id(&Uuid::new_v4()).await.unwrap().is_none());
            }

            #[tokio::test]
            async fn test_find_many_empty() {
                let service = $factory;
                let docs = service.find_many(&QuerySpec::default()).await.unwrap();
                assert!(docs.is_empty());
            }

            #[tokio::test]
            async fn test_documents_carry_id_and_version() {
                let service = $factory;
                seeded(&service).await;

                let docs = service.find_many(&QuerySpec::default()).await.unwrap();
                assert_eq!(docs.len(), 5);
                for doc in &docs {
                    assert!(Uuid::parse_str(doc["id"].as_str().unwrap()).is_ok());
                    assert_eq!(doc["__v"], 0);
                }
            }

            #[tokio::test]
            async fn test_update_merges_patch() {
                let service = $factory;
                let created = seeded(&service).await.remove(0);

                let updated = service
                    .update_by_id(&created.id, json!({"price": 450, "name": "The Forest Walker"}))
                    .await
                    .unwrap()
                    .expect("tour exists");
                assert_eq!(updated.id, created.id);
                assert_eq!(updated.price, 450.0);
                assert_eq!(updated.slug, "the-forest-walker");
                assert_eq!(updated.duration, created.duration);

                let found = service.find_by_id(&created.id).await.unwrap().unwrap();
                assert_eq!(found.price, 450.0);
            }

            #[tokio::test]
            async fn test_update_validates() {
                let service = $factory;
                let created = seeded(&service).await.remove(0);

                let result = service
                    .update_by_id(&created.id, json!({"priceDiscount": 9999}))
                    .await;
                assert!(result.is_err());

                let found = service.find_by_id(&created.id).await.unwrap().unwrap();
                assert_eq!(found.price_discount, None);
            }

            #[tokio::test]
            async fn test_update_nonexistent() {
                let service = $factory;
                let result = service
                    .update_by_id(&Uuid::new_v4(), json!({"price": 1}))
                    .await
                    .unwrap();
                assert!(result.is_none());
            }

            #[tokio::test]
            async fn test_delete_returns_removed() {
                let service = $factory;
                let created = seeded(&service).await.remove(1);

                let removed = service.delete_by_id(&created.id).await.unwrap();
                assert_eq!(removed.map(|t| t.id), Some(created.id));
                assert!(service.find_by_id(&created.id).await.unwrap().is_none());
                assert!(service.delete_by_id(&created.id).await.unwrap().is_none());
            }

            // ==================================================================
            // Query specs
            // ==================================================================

            #[tokio::test]
            async fn test_filter_equality_and_comparison() {
                let service = $factory;
                seeded(&service).await;

                let spec = QuerySpec::filtered(vec![
                    Condition::eq("difficulty", "easy"),
                    Condition::cmp("price", Comparison::Gte, 500),
                ]);
                let docs = service.find_many(&spec).await.unwrap();
                assert_eq!(names(&docs), vec!["The City Wanderer"]);
            }

            #[tokio::test]
            async fn test_filter_numeric_string_matches_number() {
                let service = $factory;
                seeded(&service).await;

                let spec = QuerySpec::filtered(vec![Condition::eq("price", "497")]);
                let docs = service.find_many(&spec).await.unwrap();
                assert_eq!(names(&docs), vec!["The Sea Explorer"]);
            }

            #[tokio::test]
            async fn test_filter_in_and_ne() {
                let service = $factory;
                seeded(&service).await;

                let spec = QuerySpec::filtered(vec![Condition::is_in(
                    "difficulty",
                    vec![json!("easy"), json!("difficult")],
                )]);
                assert_eq!(service.find_many(&spec).await.unwrap().len(), 3);

                let spec = QuerySpec::filtered(vec![Condition::ne("difficulty", "medium")]);
                assert_eq!(service.find_many(&spec).await.unwrap().len(), 3);
            }

            #[tokio::test]
            async fn test_sort_skip_limit() {
                let service = $factory;
                seeded(&service).await;

                let spec = QuerySpec {
                    sort: vec![SortKey::parse("-price").unwrap()],
                    skip: 1,
                    limit: Some(2),
                    ..QuerySpec::default()
                };
                let docs = service.find_many(&spec).await.unwrap();
                assert_eq!(names(&docs), vec!["The City Wanderer", "The Snow Adventurer"]);
            }

            #[tokio::test]
            async fn test_sort_by_multiple_keys() {
                let service = $factory;
                seeded(&service).await;

                let spec = QuerySpec {
                    sort: vec![
                        SortKey::parse("difficulty").unwrap(),
                        SortKey::parse("-price").unwrap(),
                    ],
                    ..QuerySpec::default()
                };
                let docs = service.find_many(&spec).await.unwrap();
                assert_eq!(
                    names(&docs),
                    vec![
                        "The Snow Adventurer",
                        "The City Wanderer",
                        "The Forest Hiker",
                        "The Park Camper",
                        "The Sea Explorer",
                    ]
                );
            }

            #[tokio::test]
            async fn test_projection() {
                let service = $factory;
                seeded(&service).await;

                let spec = QuerySpec::default()
                    .project(Projection::Include(vec!["name".into(), "price".into()]));
                let docs = service.find_many(&spec).await.unwrap();
                for doc in &docs {
                    let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
                    assert_eq!(keys.len(), 3, "unexpected fields in {:?}", keys);
                    assert!(doc.get("id").is_some());
                    assert!(doc.get("summary").is_none());
                }

                let spec = QuerySpec::default()
                    .project(Projection::Exclude(vec!["summary".into()]));
                let docs = service.find_many(&spec).await.unwrap();
                assert!(docs.iter().all(|d| d.get("summary").is_none()));
                assert!(docs.iter().all(|d| d.get("price").is_some()));
            }

            #[tokio::test]
            async fn test_find_one_and_find_all() {
                let service = $factory;
                seeded(&service).await;

                let found = service
                    .find_one(vec![Condition::eq("slug", "the-sea-explorer")])
                    .await
                    .unwrap()
                    .expect("tour by slug");
                assert_eq!(found.price, 497.0);

                let cheap = service
                    .find_all(vec![Condition::cmp("price", Comparison::Lt, 1000)])
                    .await
                    .unwrap();
                assert_eq!(cheap.len(), 3);

                let none = service
                    .find_one(vec![Condition::eq("slug", "no-such-tour")])
                    .await
                    .unwrap();
                assert!(none.is_none());
            }

            // ==================================================================
            // Entity rules
            // ==================================================================

            #[tokio::test]
            async fn test_secret_tours_are_hidden() {
                let service = $factory;
                seeded(&service).await;
                let secret = service
                    .create(create_secret_tour("The Secret Valley"))
                    .await
                    .unwrap();

                let docs = service.find_many(&QuerySpec::default()).await.unwrap();
                assert_eq!(docs.len(), 5);
                assert!(service.find_by_id(&secret.id).await.unwrap().is_none());
                assert!(service.update_by_id(&secret.id, json!({"price": 1})).await.unwrap().is_none());
            }

            #[tokio::test]
            async fn test_unique_name() {
                let service = $factory;
                seeded(&service).await;

                let err = service
                    .create(create_test_tour("The Forest Hiker", 100.0, "easy"))
                    .await
                    .unwrap_err();
                assert!(
                    matches!(err, AppError::Storage(StorageError::Duplicate { .. })),
                    "got {:?}",
                    err
                );
                assert!(err.to_string().contains("\"The Forest Hiker\""));
            }

            // ==================================================================
            // Concurrency
            // ==================================================================

            #[tokio::test]
            async fn test_concurrent_access() {
                let service = $factory;

                let mut handles = Vec::new();
                for i in 0..10 {
                    let service = service.clone();
                    handles.push(tokio::spawn(async move {
                        let tour = create_test_tour(&format!("The Parallel Tour {}", i), 100.0 + i as f64, "easy");
                        service.create(tour).await
                    }));
                }
                for handle in handles {
                    handle.await.unwrap().unwrap();
                }

                let docs = service.find_many(&QuerySpec::default()).await.unwrap();
                assert_eq!(docs.len(), 10);
            }

            #[tokio::test]
            async fn test_concurrent_updates_keep_each_others_fields() {
                let service = $factory;
                let created = seeded(&service).await.remove(0);

                let patches = [
                    json!({"price": 450}),
                    json!({"ratingsQuantity": 7, "ratingsAverage": 4.8}),
                    json!({"maxGroupSize": 12}),
                    json!({"summary": "Breathtaking hike through the Canadian Banff National Park"}),
                ];
                let mut handles = Vec::new();
                for patch in patches {
                    let service = service.clone();
                    let id = created.id;
                    handles.push(tokio::spawn(async move {
                        service.update_by_id(&id, patch).await
                    }));
                }
                for handle in handles {
                    assert!(handle.await.unwrap().unwrap().is_some());
                }

                let found = service.find_by_id(&created.id).await.unwrap().unwrap();
                assert_eq!(found.price, 450.0);
                assert_eq!(found.ratings_quantity, 7);
                assert_eq!(found.ratings_average, 4.8);
                assert_eq!(found.max_group_size, 12);
                assert!(found.summary.starts_with("Breathtaking"));
                assert_eq!(found.name, created.name);
            }
        }
    };
}
