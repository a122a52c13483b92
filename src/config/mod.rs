//! Configuration loading and management
//!
//! Settings come from a YAML file and are then overridden from environment
//! variables, so secrets never have to live in the file.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Deployment environment; production hides internal error details
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Absolute base URL used in emails and checkout redirects
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            public_url: None,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    /// Public base URL without a trailing slash
    pub fn base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    InMemory,
    Mongodb,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    /// Connection string; `<PASSWORD>` is replaced by `password`
    pub uri: Option<String>,
    pub password: Option<String>,
    pub name: String,
}

impl DatabaseConfig {
    /// The connection string with the password placeholder filled in
    pub fn connection_uri(&self) -> Result<String> {
        let uri = self
            .uri
            .as_deref()
            .ok_or_else(|| anyhow!("database.uri is required for the mongodb backend"))?;
        Ok(match &self.password {
            Some(password) => uri.replace("<PASSWORD>", password),
            None => uri.to_string(),
        })
    }

    pub fn database_name(&self) -> &str {
        if self.name.is_empty() { "natours" } else { &self.name }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expires_in_days: i64,
    pub cookie_expires_in_days: i64,
    pub password_min_length: u64,
    pub reset_token_ttl_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me-in-production-please-32chars".to_string(),
            jwt_expires_in_days: 90,
            cookie_expires_in_days: 90,
            password_min_length: 8,
            reset_token_ttl_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    /// Key clients on the first `x-forwarded-for` entry instead of the peer
    /// address. Only safe behind a proxy that overwrites the header.
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 3600,
            trust_proxy: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
    pub currency: String,
    /// Where tour cover images are publicly reachable
    pub image_base_url: Option<String>,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            api_base: "https://api.stripe.com".to_string(),
            currency: "usd".to_string(),
            image_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "Natours <hello@natours.io>".to_string(),
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub payments: PaymentsConfig,
    pub mail: MailConfig,
    pub body_limit_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            payments: PaymentsConfig::default(),
            mail: MailConfig::default(),
            body_limit_bytes: 10 * 1024,
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (an environment-like key/value source)
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(env) = lookup("APP_ENV") {
            self.environment = match env.as_str() {
                "production" => Environment::Production,
                "development" => Environment::Development,
                other => return Err(anyhow!("unknown APP_ENV value: {}", other)),
            };
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().with_context(|| format!("invalid PORT: {}", port))?;
        }
        if let Some(uri) = lookup("DATABASE_URL") {
            self.database.uri = Some(uri);
            self.database.backend = StorageBackend::Mongodb;
        }
        if let Some(password) = lookup("DATABASE_PASSWORD") {
            self.database.password = Some(password);
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(days) = lookup("JWT_EXPIRES_IN_DAYS") {
            self.auth.jwt_expires_in_days = days
                .parse()
                .with_context(|| format!("invalid JWT_EXPIRES_IN_DAYS: {}", days))?;
        }
        if let Some(days) = lookup("JWT_COOKIE_EXPIRES_IN_DAYS") {
            self.auth.cookie_expires_in_days = days
                .parse()
                .with_context(|| format!("invalid JWT_COOKIE_EXPIRES_IN_DAYS: {}", days))?;
        }
        if let Some(key) = lookup("STRIPE_SECRET_KEY") {
            self.payments.secret_key = Some(key);
        }
        if let Some(secret) = lookup("STRIPE_WEBHOOK_SECRET") {
            self.payments.webhook_secret = Some(secret);
        }
        if let Some(from) = lookup("MAIL_FROM") {
            self.mail.from = from;
        }
        Ok(self)
    }
}
