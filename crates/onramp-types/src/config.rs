//! Global configuration for external service endpoints.

use serde::{Deserialize, Serialize};

/// Global configuration, loaded from `{data_dir}/config.toml`.
///
/// Every field has a default suitable for local development, so a missing
/// or partial config file is never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Base URL of the e-signature service.
    #[serde(default = "default_esign_base_url")]
    pub esign_base_url: String,

    /// URL of the outbound email webhook.
    #[serde(default = "default_email_webhook_url")]
    pub email_webhook_url: String,

    /// Publicly reachable base URL of this service, passed to the
    /// e-signature service for signature/quiz callbacks.
    #[serde(default = "default_webhook_base_url")]
    pub webhook_base_url: String,

    /// Scheduling link sent in the onboarding-call email.
    #[serde(default = "default_scheduling_link")]
    pub scheduling_link: String,

    /// Timeout for calls to external services, in seconds.
    #[serde(default = "default_service_timeout_secs")]
    pub service_timeout_secs: u64,
}

fn default_esign_base_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_email_webhook_url() -> String {
    "http://localhost:9091/email".to_string()
}

fn default_webhook_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_scheduling_link() -> String {
    "https://calendly.example.com/hr/onboarding-call".to_string()
}

fn default_service_timeout_secs() -> u64 {
    30
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            esign_base_url: default_esign_base_url(),
            email_webhook_url: default_email_webhook_url(),
            webhook_base_url: default_webhook_base_url(),
            scheduling_link: default_scheduling_link(),
            service_timeout_secs: default_service_timeout_secs(),
        }
    }
}
