//! Shared setup for HTTP-level tests
//!
//! [`TestApp`] runs the full router against in-memory storage with a
//! recording mailer, a cheap password hasher and a stub payment provider.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tourbook::auth::PasswordHasher;
use tourbook::config::AppConfig;
use tourbook::core::entity::Entity;
use tourbook::entities::{Booking, Role, Tour, User};
use tourbook::mail::MemoryMailer;
use tourbook::payments::{
    CheckoutRequest, CheckoutSession, PaymentError, PaymentGateway, WebhookVerifier,
};
use tourbook::server::{AppState, build_router};
use tourbook::storage::Storage;

pub const PASSWORD: &str = "pass1234";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Records checkout requests and answers with a fixed session
#[derive(Default)]
pub struct StubGateway {
    pub requests: Mutex<Vec<CheckoutRequest>>,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.requests.lock().unwrap().push(request);
        Ok(CheckoutSession {
            id: "cs_test_123".to_string(),
            url: Some("https://checkout.stripe.com/c/pay/cs_test_123".to_string()),
        })
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub mailer: MemoryMailer,
    pub gateway: Arc<StubGateway>,
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(AppConfig::default())
}

pub fn spawn_app_with(config: AppConfig) -> TestApp {
    let mailer = MemoryMailer::new();
    let gateway = Arc::new(StubGateway::default());

    let state = AppState::new(config, Storage::in_memory())
        .unwrap()
        .with_passwords(PasswordHasher::with_params(1024, 1, 1).unwrap())
        .with_mailer(Arc::new(mailer.clone()))
        .with_payments(gateway.clone())
        .with_webhooks(WebhookVerifier::new(WEBHOOK_SECRET));

    let server = TestServer::new(build_router(state.clone()));
    TestApp {
        server,
        state,
        mailer,
        gateway,
    }
}

impl TestApp {
    /// Store a user with `role` and return it with a session token
    pub async fn user(&self, name: &str, email: &str, role: Role) -> (User, String) {
        let hash = self.state.passwords.hash(PASSWORD).unwrap();
        let mut user = User::new(name, email, hash);
        user.role = role;
        let user = self.state.storage.users.create(user).await.unwrap();
        let token = self.state.tokens.sign(&user.id).unwrap();
        (user, token)
    }

    pub async fn admin(&self) -> (User, String) {
        self.user("Admin Person", "admin@natours.io", Role::Admin).await
    }

    pub async fn customer(&self, email: &str) -> (User, String) {
        self.user("Laura Wilson", email, Role::User).await
    }

    pub async fn tour(&self, name: &str, price: f64, difficulty: &str) -> Tour {
        let tour = Tour::from_payload(tour_payload(name, price, difficulty)).unwrap();
        self.state.storage.tours.create(tour).await.unwrap()
    }

    pub async fn booking(&self, tour: &Tour, user: &User) -> Booking {
        self.state
            .storage
            .bookings
            .create(Booking::paid(tour.id, user.id, tour.price))
            .await
            .unwrap()
    }
}

pub fn tour_payload(name: &str, price: f64, difficulty: &str) -> Value {
    json!({
        "name": name,
        "duration": 7,
        "maxGroupSize": 15,
        "difficulty": difficulty,
        "price": price,
        "summary": format!("Summary of {}", name),
        "imageCover": "tour-1-cover.jpg",
        "startDates": ["2021-06-19T09:00:00.000Z", "2021-07-20T09:00:00.000Z"],
        "startLocation": {
            "type": "Point",
            "coordinates": [-116.214531, 51.417611],
            "description": "Banff, CAN"
        }
    })
}

/// The `data.data` payload of a success envelope
pub fn data(body: &Value) -> &Value {
    &body["data"]["data"]
}

pub fn names(body: &Value) -> Vec<String> {
    data(body)
        .as_array()
        .map(|docs| {
            docs.iter()
                .map(|d| d["name"].as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}
