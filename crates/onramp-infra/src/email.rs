//! Outbound email client.
//!
//! Posts email payloads to a webhook endpoint. Delivery is fire-and-log:
//! the caller records failures in the employee's email audit log, and
//! compliance gating never depends on notification delivery.

use std::time::Duration;

use chrono::Utc;
use onramp_core::workflow::executor::{DeliveryError, EmailClient};
use onramp_types::config::GlobalConfig;
use serde::Serialize;

use crate::retry::with_backoff;

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    to: &'a str,
    subject: &'a str,
    content: &'a str,
    template: &'a str,
    timestamp: String,
}

/// HTTP client posting emails to the configured webhook.
pub struct WebhookEmailClient {
    http: reqwest::Client,
    webhook_url: String,
    retry_attempts: u32,
    retry_base_delay: Duration,
}

impl WebhookEmailClient {
    pub fn new(config: &GlobalConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.service_timeout_secs))
            .build()
            .expect("reqwest client construction cannot fail with static options");

        Self {
            http,
            webhook_url: config.email_webhook_url.clone(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }

    /// Override the retry policy (used by tests to avoid long backoffs).
    pub fn with_retry(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_base_delay = base_delay;
        self
    }

    async fn post_once(
        &self,
        to: &str,
        subject: &str,
        content: &str,
        template: &str,
    ) -> Result<(), DeliveryError> {
        let payload = EmailPayload {
            to,
            subject,
            content,
            template,
            timestamp: Utc::now().to_rfc3339(),
        };

        let response = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status {
                status: status.as_u16(),
            })
        }
    }
}

impl EmailClient for WebhookEmailClient {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        content: &str,
        template: &str,
    ) -> Result<(), DeliveryError> {
        with_backoff(self.retry_attempts, self.retry_base_delay, |_| {
            self.post_once(to, subject, content, template)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
