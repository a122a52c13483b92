//! Tour entity with its start location, stops and rating summary

use crate::core::query::Condition;
use crate::core::timestamp;
use crate::impl_entity;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::LazyLock;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

/// GeoJSON geometry type; only points are stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoKind {
    #[default]
    Point,
}

/// A GeoJSON point with a human description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(rename = "type", default)]
    pub kind: GeoKind,
    /// `[longitude, latitude]`
    #[validate(length(equal = 2, message = "Coordinates must be [longitude, latitude]"))]
    pub coordinates: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

impl Location {
    pub fn lat_lng(&self) -> Option<(f64, f64)> {
        match self.coordinates.as_slice() {
            [lng, lat] => Some((*lat, *lng)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "discount_below_price"))]
pub struct Tour {
    pub id: Uuid,
    #[validate(length(
        min = 10,
        max = 40,
        message = "A tour name must have between 10 and 40 characters"
    ))]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[validate(range(min = 1, message = "A tour must last at least one day"))]
    pub duration: u32,
    #[validate(range(min = 1, message = "A tour group must have at least one person"))]
    pub max_group_size: u32,
    pub difficulty: Difficulty,
    #[serde(default = "default_ratings_average")]
    #[validate(range(
        min = 1.0,
        max = 5.0,
        message = "A rating must be between 1.0 and 5.0"
    ))]
    pub ratings_average: f64,
    #[serde(default)]
    pub ratings_quantity: u32,
    #[validate(range(min = 0.0, message = "A tour price can not be negative"))]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    #[validate(length(min = 1, message = "A tour must have a summary"))]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::vec")]
    pub start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub secret_tour: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub start_location: Option<Location>,
    #[serde(default)]
    #[validate(nested)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub guides: Vec<Uuid>,
}

fn default_ratings_average() -> f64 {
    4.5
}

fn discount_below_price(tour: &Tour) -> Result<(), ValidationError> {
    match tour.price_discount {
        Some(discount) if discount >= tour.price => Err(ValidationError::new("price_discount")
            .with_message(Cow::Owned(format!(
                "Discount price ({}) should be below regular price",
                discount
            )))),
        _ => Ok(()),
    }
}

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static slug pattern"));

/// `"The Forest Hiker"` → `"the-forest-hiker"`
pub fn slugify(name: &str) -> String {
    NON_SLUG_CHARS
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Round to one decimal place
pub fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl_entity!(Tour, "tour", "tours", {
    fn required_fields() -> &'static [(&'static str, &'static str)] {
        &[
            ("name", "A tour must have a name"),
            ("duration", "A tour must have a duration"),
            ("maxGroupSize", "A tour must have a group size"),
            ("difficulty", "A tour must have a difficulty"),
            ("price", "A tour must have a price"),
            ("summary", "A tour must have a summary"),
            ("imageCover", "A tour must have a cover image"),
        ]
    }

    fn hidden_fields() -> &'static [&'static str] {
        &["createdAt"]
    }

    fn unique_keys() -> &'static [&'static [&'static str]] {
        &[&["name"]]
    }

    fn base_filter() -> Vec<Condition> {
        vec![Condition::ne("secretTour", true)]
    }

    fn prepare(&mut self) {
        self.name = self.name.trim().to_string();
        self.summary = self.summary.trim().to_string();
        self.description = self
            .description
            .take()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.slug = slugify(&self.name);
        self.ratings_average = round_rating(self.ratings_average);
    }

    fn add_virtuals(doc: &mut Map<String, Value>) {
        if let Some(duration) = doc.get("duration").and_then(Value::as_f64) {
            doc.insert("durationWeeks".into(), Value::from(duration / 7.0));
        }
    }
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Entity;
    use crate::core::error::{AppError, ValidationError as AppValidationError};
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "name": "  The Forest Hiker ",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "imageCover": "tour-1-cover.jpg",
            "startLocation": {
                "coordinates": [-115.570154, 51.178456],
                "address": "224 Banff Ave, Banff, AB, Canada"
            }
        })
    }

    #[test]
    fn test_from_payload_assigns_server_fields() {
        let tour = Tour::from_payload(payload()).unwrap();
        assert_eq!(tour.name, "The Forest Hiker");
        assert_eq!(tour.slug, "the-forest-hiker");
        assert_eq!(tour.ratings_average, 4.5);
        assert_eq!(tour.ratings_quantity, 0);
        assert!(!tour.secret_tour);
        assert_eq!(
            tour.start_location.as_ref().unwrap().lat_lng(),
            Some((51.178456, -115.570154))
        );
    }

    #[test]
    fn test_client_cannot_choose_id() {
        let mut body = payload();
        let forced = Uuid::new_v4();
        body["id"] = json!(forced.to_string());
        let tour = Tour::from_payload(body).unwrap();
        assert_ne!(tour.id, forced);
    }

    #[test]
    fn test_missing_required_fields_are_listed() {
        let err = Tour::from_payload(json!({"name": "Just a name here"})).unwrap_err();
        let AppError::Validation(AppValidationError::FieldErrors(fields)) = err else {
            panic!("expected field errors");
        };
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert!(names.contains(&"price"));
        assert!(names.contains(&"difficulty"));
        assert!(!names.contains(&"name"));
    }

    #[test]
    fn test_discount_must_be_below_price() {
        let mut body = payload();
        body["priceDiscount"] = json!(500);
        let err = Tour::from_payload(body).unwrap_err();
        assert!(err.to_string().contains("Discount price (500)"));
    }

    #[test]
    fn test_invalid_difficulty_and_short_name() {
        let mut body = payload();
        body["difficulty"] = json!("extreme");
        assert!(Tour::from_payload(body).is_err());

        let mut body = payload();
        body["name"] = json!("Short");
        let err = Tour::from_payload(body).unwrap_err();
        assert!(err.to_string().contains("between 10 and 40"));
    }

    #[test]
    fn test_patch_regenerates_slug_and_rounds_rating() {
        let tour = Tour::from_payload(payload()).unwrap();
        let patched = tour
            .apply_patch(json!({"name": "The Sea Explorer", "ratingsAverage": 4.666}))
            .unwrap();
        assert_eq!(patched.id, tour.id);
        assert_eq!(patched.slug, "the-sea-explorer");
        assert_eq!(patched.ratings_average, 4.7);
    }

    #[test]
    fn test_present_adds_duration_weeks() {
        let tour = Tour::from_payload(payload()).unwrap();
        let out = tour.output().unwrap();
        assert_eq!(out["durationWeeks"], json!(5.0 / 7.0));
        assert_eq!(out["slug"], "the-forest-hiker");
        assert!(out.get("createdAt").is_none());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Northern Lights"), "the-northern-lights");
        assert_eq!(slugify("  Wine & Dine!  "), "wine-dine");
    }
}
