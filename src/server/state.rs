//! Shared application state

use crate::auth::{PasswordHasher, TokenSigner};
use crate::config::AppConfig;
use crate::core::error::AppResult;
use crate::core::expansion::Expansion;
use crate::core::service::DataService;
use crate::entities::{Booking, Review, Tour, User};
use crate::handlers::Resource;
use crate::mail::{LogMailer, Mailer};
use crate::payments::{PaymentGateway, WebhookVerifier, gateway_from_config};
use crate::storage::Storage;
use crate::views::Views;
use axum::extract::FromRef;
use std::sync::Arc;

/// Everything a handler may need, cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Storage,
    pub tokens: TokenSigner,
    pub passwords: PasswordHasher,
    pub mailer: Arc<dyn Mailer>,
    pub payments: Arc<dyn PaymentGateway>,
    pub webhooks: Option<WebhookVerifier>,
    pub views: Arc<Views>,
    tours: Resource<Tour>,
    reviews: Resource<Review>,
    bookings: Resource<Booking>,
    users: Resource<User>,
}

/// Authors shown next to a review
fn review_author(users: Arc<dyn DataService<User>>) -> Expansion {
    Expansion::reference("user", users).select(&["name", "photo"])
}

impl AppState {
    /// State with the collaborators the configuration selects
    pub fn new(config: AppConfig, storage: Storage) -> AppResult<Self> {
        let tours = Resource::new(storage.tours.clone())
            .expand(
                Expansion::reference("guides", storage.users.clone())
                    .select(&["name", "email", "photo", "role"]),
            )
            .expand_detail(
                Expansion::reverse("reviews", "tour", storage.reviews.clone()).nested(
                    storage.reviews.clone(),
                    vec![review_author(storage.users.clone())],
                ),
            );

        let reviews = Resource::new(storage.reviews.clone())
            .scoped("tourId", "tour")
            .expand(review_author(storage.users.clone()));

        let bookings = Resource::new(storage.bookings.clone())
            .scoped("userId", "user")
            .scoped("tourId", "tour")
            .expand(Expansion::reference("user", storage.users.clone()).select(&["name", "email"]))
            .expand(Expansion::reference("tour", storage.tours.clone()).select(&["name"]));

        let users = Resource::new(storage.users.clone());

        Ok(Self {
            tokens: TokenSigner::new(&config.auth.jwt_secret, config.auth.jwt_expires_in_days),
            passwords: PasswordHasher::default(),
            mailer: Arc::new(LogMailer),
            payments: gateway_from_config(&config.payments),
            webhooks: config.payments.webhook_secret.as_deref().map(WebhookVerifier::new),
            views: Arc::new(Views::new()?),
            config: Arc::new(config),
            storage,
            tours,
            reviews,
            bookings,
            users,
        })
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_payments(mut self, payments: Arc<dyn PaymentGateway>) -> Self {
        self.payments = payments;
        self
    }

    pub fn with_webhooks(mut self, verifier: WebhookVerifier) -> Self {
        self.webhooks = Some(verifier);
        self
    }

    /// Replace the password hasher (tests use cheap parameters)
    pub fn with_passwords(mut self, passwords: PasswordHasher) -> Self {
        self.passwords = passwords;
        self
    }

    pub fn tours(&self) -> &Resource<Tour> {
        &self.tours
    }

    pub fn reviews(&self) -> &Resource<Review> {
        &self.reviews
    }

    pub fn bookings(&self) -> &Resource<Booking> {
        &self.bookings
    }

    pub fn users(&self) -> &Resource<User> {
        &self.users
    }
}

impl FromRef<AppState> for Resource<Tour> {
    fn from_ref(state: &AppState) -> Self {
        state.tours.clone()
    }
}

impl FromRef<AppState> for Resource<Review> {
    fn from_ref(state: &AppState) -> Self {
        state.reviews.clone()
    }
}

impl FromRef<AppState> for Resource<Booking> {
    fn from_ref(state: &AppState) -> Self {
        state.bookings.clone()
    }
}

impl FromRef<AppState> for Resource<User> {
    fn from_ref(state: &AppState) -> Self {
        state.users.clone()
    }
}
