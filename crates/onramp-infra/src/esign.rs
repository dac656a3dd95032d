//! E-signature service client.
//!
//! Sends documents for signature over HTTP with bounded timeout and
//! bounded exponential-backoff retry. When the service stays unreachable,
//! falls back to a deterministic simulated dispatch so the pipeline can
//! still progress in degraded/test mode -- the fallback is recorded on the
//! dispatch (`simulated: true`).

use std::time::Duration;

use chrono::Utc;
use onramp_core::workflow::executor::{DeliveryError, DocumentClient};
use onramp_types::config::GlobalConfig;
use onramp_types::employee::Employee;
use onramp_types::onboarding::{DocumentDispatch, DocumentKind};
use serde::{Deserialize, Serialize};

use crate::retry::with_backoff;

/// Default retry attempts for the send call.
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default base delay between retries.
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SendDocumentRequest<'a> {
    document_id: &'a str,
    sender_email: &'a str,
    sender_name: &'a str,
    receiver_email: &'a str,
    purpose: String,
    employee_id: String,
    webhook_base_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendDocumentResponse {
    data: Option<SendDocumentData>,
}

#[derive(Debug, Deserialize)]
struct SendDocumentData {
    tracking_id: String,
    signing_url: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the e-signature service.
pub struct EsignClient {
    http: reqwest::Client,
    base_url: String,
    webhook_base_url: String,
    retry_attempts: u32,
    retry_base_delay: Duration,
}

impl EsignClient {
    pub fn new(config: &GlobalConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.service_timeout_secs))
            .build()
            .expect("reqwest client construction cannot fail with static options");

        Self {
            http,
            base_url: config.esign_base_url.trim_end_matches('/').to_string(),
            webhook_base_url: config.webhook_base_url.clone(),
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

    /// The document id the remote service knows this document by.
    fn remote_document_id(document: DocumentKind) -> &'static str {
        match document {
            DocumentKind::Policy => "company_policy",
            DocumentKind::Nda => "nda_policy",
            DocumentKind::Guidelines => "dev_guidelines",
        }
    }

    async fn send_once(
        &self,
        employee: &Employee,
        document: DocumentKind,
    ) -> Result<DocumentDispatch, DeliveryError> {
        let request = SendDocumentRequest {
            document_id: Self::remote_document_id(document),
            sender_email: "hr@company.com",
            sender_name: "HR Department",
            receiver_email: &employee.email,
            purpose: format!("Please review and sign the {}", document.title()),
            employee_id: employee.id.to_string(),
            webhook_base_url: &self.webhook_base_url,
        };

        let response = self
            .http
            .post(format!("{}/api/send-document", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
            });
        }

        let body: SendDocumentResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(format!("invalid response body: {e}")))?;
        let data = body
            .data
            .ok_or_else(|| DeliveryError::Transport("response missing data".to_string()))?;

        Ok(DocumentDispatch {
            tracking_id: data.tracking_id,
            signing_url: data.signing_url,
            simulated: false,
            dispatched_at: Utc::now(),
        })
    }

    /// Deterministic local stand-in when the service is unreachable.
    fn simulated_dispatch(&self, employee: &Employee, document: DocumentKind) -> DocumentDispatch {
        DocumentDispatch {
            tracking_id: format!("sim-{}-{}", document, employee.id),
            signing_url: format!("{}/sign/simulated-{}", self.base_url, document),
            simulated: true,
            dispatched_at: Utc::now(),
        }
    }
}

impl DocumentClient for EsignClient {
    async fn send_document(
        &self,
        employee: &Employee,
        document: DocumentKind,
    ) -> Result<DocumentDispatch, DeliveryError> {
        let attempt_result = with_backoff(self.retry_attempts, self.retry_base_delay, |_| {
            self.send_once(employee, document)
        })
        .await;

        match attempt_result {
            Ok(dispatch) => Ok(dispatch),
            Err(e) => {
                tracing::warn!(
                    employee_id = %employee.id,
                    document = %document,
                    error = %e,
                    "e-sign service unavailable, falling back to simulated dispatch"
                );
                Ok(self.simulated_dispatch(employee, document))
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> DeliveryError {
    if e.is_timeout() {
        DeliveryError::Timeout
    } else {
        DeliveryError::Transport(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
