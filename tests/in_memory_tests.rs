//! Integration tests for InMemoryDataService using the storage test harness.
//!
//! This file invokes `data_service_tests!` to validate that InMemoryDataService
//! fully conforms to the DataService<Tour> contract, then checks the review
//! rating aggregates on top of it.

#[macro_use]
mod storage_harness;

use storage_harness::*;
use tourbook::core::service::DataService;
use tourbook::entities::Tour;
use tourbook::storage::{InMemoryDataService, Storage};
use uuid::Uuid;

data_service_tests!(InMemoryDataService::<Tour>::new());

#[tokio::test]
async fn test_storage_keeps_tour_ratings_in_sync() {
    let storage = Storage::in_memory();
    let tour = storage
        .tours
        .create(create_test_tour("The Forest Hiker", 397.0, "easy"))
        .await
        .unwrap();

    let first = storage
        .reviews
        .create(create_test_review(tour.id, Uuid::new_v4(), 5.0))
        .await
        .unwrap();
    storage
        .reviews
        .create(create_test_review(tour.id, Uuid::new_v4(), 4.0))
        .await
        .unwrap();

    let rated = storage.tours.find_by_id(&tour.id).await.unwrap().unwrap();
    assert_eq!(rated.ratings_quantity, 2);
    assert_eq!(rated.ratings_average, 4.5);

    storage.reviews.delete_by_id(&first.id).await.unwrap();
    let rated = storage.tours.find_by_id(&tour.id).await.unwrap().unwrap();
    assert_eq!(rated.ratings_quantity, 1);
    assert_eq!(rated.ratings_average, 4.0);
}

#[tokio::test]
async fn test_one_review_per_user_and_tour() {
    let storage = Storage::in_memory();
    let (tour, user) = (Uuid::new_v4(), Uuid::new_v4());
    let reviews = &storage.reviews;

    reviews.create(create_test_review(tour, user, 4.0)).await.unwrap();
    assert!(reviews.create(create_test_review(tour, user, 2.0)).await.is_err());
    assert!(reviews.create(create_test_review(Uuid::new_v4(), user, 2.0)).await.is_ok());
}
