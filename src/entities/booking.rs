//! Bookings

use crate::core::timestamp;
use crate::impl_entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub tour: Uuid,
    pub user: Uuid,
    #[validate(range(min = 0.0, message = "Booking price can not be negative"))]
    pub price: f64,
    #[serde(default = "paid_by_default")]
    pub paid: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

fn paid_by_default() -> bool {
    true
}

impl Booking {
    /// A paid booking created outside the generic create path
    pub fn paid(tour: Uuid, user: Uuid, price: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            tour,
            user,
            price,
            paid: true,
            created_at: Utc::now(),
        }
    }
}

impl_entity!(Booking, "booking", "bookings", {
    fn required_fields() -> &'static [(&'static str, &'static str)] {
        &[
            ("tour", "Booking must belong to a Tour!"),
            ("user", "Booking must belong to a User!"),
            ("price", "Booking must have a price."),
        ]
    }
});
