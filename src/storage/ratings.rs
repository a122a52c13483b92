//! Keeps a tour's rating statistics in step with its reviews

use crate::core::error::AppResult;
use crate::core::query::{Condition, QuerySpec};
use crate::core::service::DataService;
use crate::entities::tour::round_rating;
use crate::entities::{Review, Tour};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

/// Rating shown for a tour nobody has reviewed yet
pub const DEFAULT_RATING: f64 = 4.5;

/// Review store that recomputes `ratingsQuantity` and `ratingsAverage` on
/// the reviewed tour after every write
pub struct RatedReviewService {
    reviews: Arc<dyn DataService<Review>>,
    tours: Arc<dyn DataService<Tour>>,
}

impl RatedReviewService {
    pub fn new(reviews: Arc<dyn DataService<Review>>, tours: Arc<dyn DataService<Tour>>) -> Self {
        Self { reviews, tours }
    }

    /// Recompute the statistics of one tour from its stored reviews
    pub async fn recalculate(&self, tour: &Uuid) -> AppResult<()> {
        let reviews = self
            .reviews
            .find_all(vec![Condition::eq("tour", tour.to_string())])
            .await?;

        let (quantity, average) = if reviews.is_empty() {
            (0, DEFAULT_RATING)
        } else {
            let sum: f64 = reviews.iter().map(|r| r.rating).sum();
            (reviews.len(), round_rating(sum / reviews.len() as f64))
        };

        tracing::debug!(%tour, quantity, average, "recalculated tour ratings");
        self.tours
            .update_by_id(
                tour,
                json!({ "ratingsQuantity": quantity, "ratingsAverage": average }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DataService<Review> for RatedReviewService {
    async fn find_many(&self, spec: &QuerySpec) -> AppResult<Vec<Value>> {
        self.reviews.find_many(spec).await
    }

    async fn find_by_id(&self, id: &Uuid) -> AppResult<Option<Review>> {
        self.reviews.find_by_id(id).await
    }

    async fn create(&self, entity: Review) -> AppResult<Review> {
        let created = self.reviews.create(entity).await?;
        self.recalculate(&created.tour).await?;
        Ok(created)
    }

    async fn update_by_id(&self, id: &Uuid, patch: Value) -> AppResult<Option<Review>> {
        let before = self.reviews.find_by_id(id).await?;
        let updated = self.reviews.update_by_id(id, patch).await?;

        if let Some(review) = &updated {
            self.recalculate(&review.tour).await?;
            if let Some(previous) = before.filter(|b| b.tour != review.tour) {
                self.recalculate(&previous.tour).await?;
            }
        }
        Ok(updated)
    }

    async fn delete_by_id(&self, id: &Uuid) -> AppResult<Option<Review>> {
        let removed = self.reviews.delete_by_id(id).await?;
        if let Some(review) = &removed {
            self.recalculate(&review.tour).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Entity;
    use crate::storage::InMemoryDataService;

    async fn setup() -> (RatedReviewService, Arc<dyn DataService<Tour>>, Tour) {
        let tours: Arc<dyn DataService<Tour>> = Arc::new(InMemoryDataService::<Tour>::new());
        let reviews: Arc<dyn DataService<Review>> = Arc::new(InMemoryDataService::<Review>::new());
        let tour = Tour::from_payload(json!({
            "name": "The Sea Explorer",
            "duration": 7,
            "maxGroupSize": 15,
            "difficulty": "medium",
            "price": 497,
            "summary": "Exploring the jaw-dropping US east coast",
            "imageCover": "tour-2-cover.jpg"
        }))
        .unwrap();
        let tour = tours.create(tour).await.unwrap();
        (RatedReviewService::new(reviews, tours.clone()), tours, tour)
    }

    fn review(tour: Uuid, rating: f64) -> Review {
        Review::from_payload(json!({
            "review": "Lovely",
            "rating": rating,
            "tour": tour.to_string(),
            "user": Uuid::new_v4().to_string()
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_ratings_follow_reviews() {
        let (service, tours, tour) = setup().await;

        let first = service.create(review(tour.id, 4.0)).await.unwrap();
        service.create(review(tour.id, 5.0)).await.unwrap();
        service.create(review(tour.id, 5.0)).await.unwrap();

        let stored = tours.find_by_id(&tour.id).await.unwrap().unwrap();
        assert_eq!(stored.ratings_quantity, 3);
        assert_eq!(stored.ratings_average, 4.7);

        service
            .update_by_id(&first.id, json!({"rating": 1}))
            .await
            .unwrap();
        let stored = tours.find_by_id(&tour.id).await.unwrap().unwrap();
        assert_eq!(stored.ratings_average, 3.7);
    }

    #[tokio::test]
    async fn test_last_review_deleted_resets_defaults() {
        let (service, tours, tour) = setup().await;
        let only = service.create(review(tour.id, 2.0)).await.unwrap();

        service.delete_by_id(&only.id).await.unwrap();

        let stored = tours.find_by_id(&tour.id).await.unwrap().unwrap();
        assert_eq!(stored.ratings_quantity, 0);
        assert_eq!(stored.ratings_average, DEFAULT_RATING);
    }
}
