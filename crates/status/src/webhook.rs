use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};

use cadence_provider::config::WEBHOOK_KEY_VAR;
use cadence_store::StoreManager;

use crate::error::{AuthError, StatusError};
use crate::mapping::map_webhook_event;

type HmacSha256 = Hmac<Sha256>;

/// One provider event as delivered in a webhook payload. Unknown fields
/// are preserved in `raw` for the tracking row's details column.
#[derive(Debug, Clone)]
struct ParsedEvent {
    message_id: String,
    event_type: String,
    timestamp: i64,
    raw: serde_json::Value,
}

/// Counters summarizing one webhook delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookReport {
    /// Events present in the payload.
    pub events_received: usize,
    /// Rows actually advanced (one per unique message id, latest event
    /// wins).
    pub applied: usize,
    /// Events whose message id matched no tracked row in any organization.
    pub unknown_message: usize,
    /// Events whose type carries no delivery signal.
    pub ignored: usize,
    /// Applied counts keyed by resulting internal status.
    pub updates: HashMap<String, usize>,
}

/// Push-mode reconciler: applies provider webhook events to tracking rows,
/// optionally verifying the HMAC signature first.
pub struct WebhookHandler {
    manager: StoreManager,
    signing_key: Option<String>,
}

impl WebhookHandler {
    /// Handler without signature verification (no key configured).
    #[must_use]
    pub fn new(manager: StoreManager) -> Self {
        Self {
            manager,
            signing_key: None,
        }
    }

    /// Require payloads to carry a valid HMAC-SHA256 signature.
    #[must_use]
    pub fn with_signing_key(mut self, key: impl Into<String>) -> Self {
        self.signing_key = Some(key.into());
        self
    }

    /// Pick the signing key up from the environment, when present.
    #[must_use]
    pub fn from_env(manager: StoreManager) -> Self {
        let key = std::env::var(WEBHOOK_KEY_VAR).ok().filter(|k| !k.is_empty());
        Self {
            manager,
            signing_key: key,
        }
    }

    /// Verify `base64(HMAC-SHA256(timestamp || payload))` in constant
    /// time. Passes trivially when no signing key is configured.
    pub fn verify_signature(
        &self,
        payload: &[u8],
        signature: &str,
        timestamp: &str,
    ) -> Result<(), AuthError> {
        let Some(key) = &self.signing_key else {
            warn!("webhook signature not verified: no signing key configured");
            return Ok(());
        };

        let mut mac =
            HmacSha256::new_from_slice(key.as_bytes()).expect("hmac accepts any key length");
        mac.update(timestamp.as_bytes());
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        let provided = BASE64.decode(signature).map_err(|_| AuthError)?;
        if provided.ct_eq(expected.as_slice()).into() {
            Ok(())
        } else {
            Err(AuthError)
        }
    }

    /// Apply a webhook payload.
    ///
    /// Events are grouped by provider message id and only the latest event
    /// per id is applied, which makes redelivery of the same payload
    /// idempotent. The owning organization is found by scanning org
    /// stores; the first match wins.
    #[instrument(skip_all, fields(bytes = payload.len()))]
    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<(&str, &str)>,
    ) -> Result<WebhookReport, StatusError> {
        if let Some((signature, timestamp)) = signature {
            self.verify_signature(payload, signature, timestamp)?;
        }

        let events: Vec<serde_json::Value> = serde_json::from_slice(payload)
            .map_err(|e| StatusError::Payload(e.to_string()))?;

        let mut report = WebhookReport {
            events_received: events.len(),
            ..WebhookReport::default()
        };

        // Latest event per message id wins.
        let mut latest: HashMap<String, ParsedEvent> = HashMap::new();
        for raw in events {
            let Some(event) = parse_event(raw) else {
                report.ignored += 1;
                continue;
            };
            match latest.get(&event.message_id) {
                Some(existing) if existing.timestamp >= event.timestamp => {}
                _ => {
                    latest.insert(event.message_id.clone(), event);
                }
            }
        }

        let now = Utc::now();
        for event in latest.into_values() {
            let Some(status) = map_webhook_event(&event.event_type) else {
                report.ignored += 1;
                continue;
            };

            let Some(org_id) = self.manager.org_for_message(&event.message_id).await? else {
                warn!(message_id = %event.message_id, "webhook event for unknown message");
                report.unknown_message += 1;
                continue;
            };

            let store = self.manager.open_org(org_id).await?;
            let Some(row) = store.find_by_message_id(&event.message_id).await? else {
                report.unknown_message += 1;
                continue;
            };

            let details = serde_json::to_string(&event.raw).unwrap_or_default();
            store
                .apply_status_result(row.id, status, &event.event_type, &details, now)
                .await?;
            report.applied += 1;
            *report.updates.entry(status.to_string()).or_default() += 1;
        }

        info!(
            received = report.events_received,
            applied = report.applied,
            unknown = report.unknown_message,
            "webhook payload applied"
        );
        Ok(report)
    }
}

/// Extract the fields the reconciler needs. Message ids arrive suffixed
/// with a filter segment (`<id>.<filter>`); only the leading id matters.
fn parse_event(raw: serde_json::Value) -> Option<ParsedEvent> {
    let message_id = raw
        .get("sg_message_id")
        .and_then(|v| v.as_str())
        .map(|id| id.split('.').next().unwrap_or(id).to_owned())
        .filter(|id| !id.is_empty())?;
    let event_type = raw.get("event").and_then(|v| v.as_str())?.to_owned();
    let timestamp = raw.get("timestamp").and_then(serde_json::Value::as_i64).unwrap_or(0);
    Some(ParsedEvent {
        message_id,
        event_type,
        timestamp,
        raw,
    })
}
