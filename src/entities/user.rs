//! User accounts, roles and password bookkeeping

use crate::core::query::Condition;
use crate::core::timestamp;
use crate::impl_entity;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[serde(default = "default_photo")]
    pub photo: String,
    #[serde(default)]
    pub role: Role,
    /// Argon2 PHC string, never the plain password
    pub password: String,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

fn default_photo() -> String {
    "default.jpg".to_string()
}

fn active_by_default() -> bool {
    true
}

impl User {
    pub fn new(name: &str, email: &str, password_hash: String) -> Self {
        let mut user = Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            photo: default_photo(),
            role: Role::User,
            password: password_hash,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
        };
        crate::core::entity::Entity::prepare(&mut user);
        user
    }

    /// Whether the password changed after a token issued at `issued_at` (unix seconds)
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| changed.timestamp() > issued_at)
    }

    /// Patch replacing the password hash and invalidating reset tokens.
    ///
    /// The change time is backdated one second so a token issued right
    /// after the change still verifies.
    pub fn password_patch(password_hash: &str) -> Value {
        let changed_at = Utc::now() - Duration::seconds(1);
        json!({
            "password": password_hash,
            "passwordChangedAt": timestamp::format(&changed_at),
            "passwordResetToken": null,
            "passwordResetExpires": null,
        })
    }
}

impl_entity!(User, "user", "users", {
    fn required_fields() -> &'static [(&'static str, &'static str)] {
        &[
            ("name", "Please tell us your name!"),
            ("email", "Please provide your email"),
            ("password", "Please provide a password"),
        ]
    }

    fn protected_fields() -> &'static [&'static str] {
        &[
            "password",
            "passwordChangedAt",
            "passwordResetToken",
            "passwordResetExpires",
            "active",
        ]
    }

    fn hidden_fields() -> &'static [&'static str] {
        &["password", "passwordResetToken", "passwordResetExpires", "active"]
    }

    fn unique_keys() -> &'static [&'static [&'static str]] {
        &[&["email"]]
    }

    fn base_filter() -> Vec<Condition> {
        vec![Condition::ne("active", false)]
    }

    fn prepare(&mut self) {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
    }
});
