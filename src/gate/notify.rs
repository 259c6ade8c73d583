//! Outbound access notification via the EmailJS REST API.

use reqwest::Client;
use serde_json::json;
use thiserror::Error;

pub const EMAILJS_SEND_URL: &str = "https://api.emailjs.com/api/v1.0/email/send";

const FROM_NAME: &str = "Proforma User";
const TO_NAME: &str = "NeuroGlympse Sales";

/// The three service identifiers EmailJS needs. Static configuration: read
/// once from the environment at startup.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
}

impl NotifyConfig {
    /// `None` when any of the three identifiers is unset, which disables
    /// notifications entirely (the gate still unlocks).
    pub fn from_env() -> Option<Self> {
        let service_id = std::env::var("EMAILJS_SERVICE_ID").ok()?;
        let template_id = std::env::var("EMAILJS_TEMPLATE_ID").ok()?;
        let public_key = std::env::var("EMAILJS_PUBLIC_KEY").ok()?;
        Some(Self {
            service_id,
            template_id,
            public_key,
        })
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notification service rejected the send (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

pub struct EmailNotifier {
    client: Client,
    endpoint: String,
    config: NotifyConfig,
}

impl EmailNotifier {
    pub fn new(config: NotifyConfig) -> Self {
        Self::with_endpoint(config, EMAILJS_SEND_URL)
    }

    /// Endpoint override for tests.
    pub fn with_endpoint(config: NotifyConfig, endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            config,
        }
    }

    /// One send per call; retries and backoff are deliberately absent.
    pub async fn send_access_request(&self, email: &str) -> Result<(), NotifyError> {
        let body = json!({
            "service_id": self.config.service_id,
            "template_id": self.config.template_id,
            "user_id": self.config.public_key,
            "template_params": {
                "from_name": FROM_NAME,
                "from_email": email,
                "to_name": TO_NAME,
                "message": format!("New proforma access request from: {email}"),
                "reply_to": email,
            },
        });

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(NotifyError::Rejected { status, body })
        }
    }
}
