//! A rated review of a tour by a user

use crate::core::timestamp;
use crate::impl_entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    #[validate(length(min = 1, message = "Review can not be empty!"))]
    pub review: String,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5"))]
    pub rating: f64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub tour: Uuid,
    pub user: Uuid,
}

impl_entity!(Review, "review", "reviews", {
    fn required_fields() -> &'static [(&'static str, &'static str)] {
        &[
            ("review", "Review can not be empty!"),
            ("rating", "Review must have a rating"),
            ("tour", "Review must belong to a tour."),
            ("user", "Review must belong to a user"),
        ]
    }

    fn unique_keys() -> &'static [&'static [&'static str]] {
        &[&["tour", "user"]]
    }

    fn prepare(&mut self) {
        self.review = self.review.trim().to_string();
    }
});
