//! Construction-time configuration for `PipedriveClient`.

use std::time::Duration;

/// Production Pipedrive host. Requests go to port 443 over HTTPS.
pub const DEFAULT_BASE_URL: &str = "https://api.pipedrive.com";

/// Versioned prefix placed in front of every endpoint path.
pub const API_VERSION_PREFIX: &str = "/v1";

/// Deal custom field that receives the sanitized free-text message. The key
/// is specific to one Pipedrive account; override it per deployment.
pub const DEFAULT_DEAL_MESSAGE_FIELD: &str = "64c365fee51a073ee12e8f218bad4fd62a8c83a9";

/// Settings captured once when the client is built and reused for every call.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    /// Whole-request timeout. `None` waits as long as the transport allows.
    pub timeout: Option<Duration>,
    pub deal_message_field: String,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            deal_message_field: DEFAULT_DEAL_MESSAGE_FIELD.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_deal_message_field(mut self, field: impl Into<String>) -> Self {
        self.deal_message_field = field.into();
        self
    }
}
