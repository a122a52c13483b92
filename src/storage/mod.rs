//! Storage implementations for different backends

pub mod in_memory;
#[cfg(feature = "mongodb_backend")]
pub mod mongodb;
pub mod ratings;

pub use in_memory::InMemoryDataService;
#[cfg(feature = "mongodb_backend")]
pub use mongodb::MongoDataService;
pub use ratings::RatedReviewService;

use crate::config::{DatabaseConfig, StorageBackend};
use crate::core::error::AppResult;
use crate::core::service::DataService;
use crate::entities::{Booking, Review, Tour, User};
use std::sync::Arc;

/// One store per entity type, shared by handlers, views and webhooks
///
/// The review store is always wrapped in [`RatedReviewService`] so tour
/// ratings stay current no matter which backend is used.
#[derive(Clone)]
pub struct Storage {
    pub tours: Arc<dyn DataService<Tour>>,
    pub reviews: Arc<dyn DataService<Review>>,
    pub bookings: Arc<dyn DataService<Booking>>,
    pub users: Arc<dyn DataService<User>>,
}

impl Storage {
    pub fn from_services(
        tours: Arc<dyn DataService<Tour>>,
        reviews: Arc<dyn DataService<Review>>,
        bookings: Arc<dyn DataService<Booking>>,
        users: Arc<dyn DataService<User>>,
    ) -> Self {
        Self {
            reviews: Arc::new(RatedReviewService::new(reviews, tours.clone())),
            tours,
            bookings,
            users,
        }
    }

    /// Fresh, empty in-memory stores
    pub fn in_memory() -> Self {
        Self::from_services(
            Arc::new(InMemoryDataService::<Tour>::new()),
            Arc::new(InMemoryDataService::<Review>::new()),
            Arc::new(InMemoryDataService::<Booking>::new()),
            Arc::new(InMemoryDataService::<User>::new()),
        )
    }

    /// MongoDB-backed stores; creates the indexes the queries rely on
    #[cfg(feature = "mongodb_backend")]
    pub async fn mongodb(database: ::mongodb::Database) -> AppResult<Self> {
        use ::mongodb::bson::doc;

        let tours = MongoDataService::<Tour>::new(database.clone());
        let reviews = MongoDataService::<Review>::new(database.clone());
        let bookings = MongoDataService::<Booking>::new(database.clone());
        let users = MongoDataService::<User>::new(database);

        tours.ensure_indexes().await?;
        tours.create_index(doc! { "price": 1, "ratingsAverage": -1 }).await?;
        tours.create_index(doc! { "slug": 1 }).await?;
        reviews.ensure_indexes().await?;
        users.ensure_indexes().await?;

        Ok(Self::from_services(
            Arc::new(tours),
            Arc::new(reviews),
            Arc::new(bookings),
            Arc::new(users),
        ))
    }

    /// Open the backend named by the configuration
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        match config.backend {
            StorageBackend::InMemory => {
                tracing::info!("Using in-memory storage");
                Ok(Self::in_memory())
            }
            #[cfg(feature = "mongodb_backend")]
            StorageBackend::Mongodb => {
                use crate::core::error::StorageError;

                let uri = config.connection_uri()?;
                let client = ::mongodb::Client::with_uri_str(&uri)
                    .await
                    .map_err(|e| StorageError::backend("mongodb", e))?;
                tracing::info!("DB connection successful ({})", config.database_name());
                Self::mongodb(client.database(config.database_name())).await
            }
            #[cfg(not(feature = "mongodb_backend"))]
            StorageBackend::Mongodb => Err(anyhow::anyhow!(
                "the mongodb backend requires the `mongodb_backend` feature"
            )
            .into()),
        }
    }
}
