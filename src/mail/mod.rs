//! Outgoing mail
//!
//! Delivery goes through the [`Mailer`] trait. [`LogMailer`] writes messages
//! to the log; [`MemoryMailer`] keeps them for inspection.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::entities::User;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Shown to clients as is; `to` and `reason` go to the log
    #[error("There was an error sending the email. Try again later!")]
    Delivery { to: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

fn first_name(user: &User) -> &str {
    user.name.split_whitespace().next().unwrap_or(&user.name)
}

impl Email {
    pub fn welcome(from: &str, user: &User, account_url: &str) -> Self {
        Self {
            from: from.to_string(),
            to: user.email.clone(),
            subject: "Welcome to the Natours Family!".to_string(),
            text: format!(
                "Hi {},\n\nWelcome to Natours, we're glad to have you!\n\
                 Head over to your account to upload a photo: {}\n",
                first_name(user),
                account_url
            ),
        }
    }

    pub fn password_reset(from: &str, user: &User, reset_url: &str, valid_minutes: i64) -> Self {
        Self {
            from: from.to_string(),
            to: user.email.clone(),
            subject: format!(
                "Your password reset token (valid for only {} minutes)",
                valid_minutes
            ),
            text: format!(
                "Hi {},\n\nForgot your password? Submit a PATCH request with your new password \
                 and passwordConfirm to: {}\nIf you didn't forget your password, please ignore \
                 this email!\n",
                first_name(user),
                reset_url
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Writes every message to the log instead of delivering it
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "sending email");
        tracing::debug!(body = %email.text, "email body");
        Ok(())
    }
}

/// Records messages in memory; can be switched to fail every delivery
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<Email>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, oldest first
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Email> {
        self.sent().pop()
    }

    pub fn fail_deliveries(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Delivery {
                to: email.to,
                reason: "delivery disabled".to_string(),
            });
        }
        self.sent
            .lock()
            .map_err(|e| MailError::Delivery {
                to: email.to.clone(),
                reason: format!("Failed to acquire lock: {}", e),
            })?
            .push(email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_mailer_records_and_fails() {
        let mailer = MemoryMailer::new();
        let user = User::new("Laura Wilson", "laura@example.com", "hash".into());

        mailer
            .send(Email::welcome("hello@natours.io", &user, "http://localhost/me"))
            .await
            .unwrap();
        let sent = mailer.last().unwrap();
        assert_eq!(sent.to, "laura@example.com");
        assert!(sent.text.starts_with("Hi Laura,"));

        mailer.fail_deliveries(true);
        let result = mailer
            .send(Email::password_reset("hello@natours.io", &user, "http://x", 10))
            .await;
        assert!(result.is_err());
        assert_eq!(mailer.sent().len(), 1);
    }
}
