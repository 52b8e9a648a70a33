use serde::{Deserialize, Serialize};

/// A fully rendered outbound message handed to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub from_addr: String,
    pub from_name: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// The provider's answer to a send attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Whether the provider accepted the message for delivery.
    pub accepted: bool,

    /// Provider-assigned message id, when one was returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Provider error text for rejected sends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendReceipt {
    #[must_use]
    pub fn accepted(message_id: Option<String>) -> Self {
        Self {
            accepted: true,
            message_id,
            error: None,
        }
    }

    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Raw per-message status as reported by the provider's query API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStatus {
    /// Provider status string, e.g. `delivered` or `bounce`.
    pub status: String,

    /// The full provider response, kept for the tracking row's
    /// `status_details` column.
    pub raw: serde_json::Value,
}

/// Output of the external templater for one `(email type, contact, date)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub text_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
}
