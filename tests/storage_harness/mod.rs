//! Shared test harness for storage backend testing
//!
//! Provides tour and review fixtures plus the `data_service_tests!` macro
//! that checks any `DataService<Tour>` against the storage contract.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//! use storage_harness::*;
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod data_service_tests;

use serde_json::{Value, json};
use tourbook::core::entity::Entity;
use tourbook::entities::{Review, Tour};
use uuid::Uuid;

/// Payload for a valid tour; names must be 10 to 40 characters
pub fn tour_payload(name: &str, price: f64, difficulty: &str) -> Value {
    json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 25,
        "difficulty": difficulty,
        "price": price,
        "summary": format!("Summary of {}", name),
        "imageCover": "tour-cover.jpg",
        "startDates": ["2021-04-25T09:00:00.000Z", "2021-07-20T09:00:00.000Z"],
        "startLocation": {
            "type": "Point",
            "coordinates": [-80.185942, 25.774772],
            "description": "Miami, USA"
        }
    })
}

pub fn create_test_tour(name: &str, price: f64, difficulty: &str) -> Tour {
    Tour::from_payload(tour_payload(name, price, difficulty)).expect("valid tour payload")
}

pub fn create_secret_tour(name: &str) -> Tour {
    let mut payload = tour_payload(name, 997.0, "difficult");
    payload["secretTour"] = json!(true);
    Tour::from_payload(payload).expect("valid tour payload")
}

pub fn create_test_review(tour: Uuid, user: Uuid, rating: f64) -> Review {
    Review::from_payload(json!({
        "review": "Loved every minute",
        "rating": rating,
        "tour": tour.to_string(),
        "user": user.to_string()
    }))
    .expect("valid review payload")
}

/// The five tours most contract tests start from
pub fn seed_tours() -> Vec<Tour> {
    vec![
        create_test_tour("The Forest Hiker", 397.0, "easy"),
        create_test_tour("The Sea Explorer", 497.0, "medium"),
        create_test_tour("The Snow Adventurer", 997.0, "difficult"),
        create_test_tour("The City Wanderer", 1197.0, "easy"),
        create_test_tour("The Park Camper", 1497.0, "medium"),
    ]
}
