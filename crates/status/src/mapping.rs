use cadence_core::SendStatus;

/// Map a provider status string (from the message query API) onto the
/// internal send status. Unknown strings stay in `processing` until the
/// provider says something definitive.
#[must_use]
pub fn map_provider_status(status: &str) -> SendStatus {
    match status.to_ascii_lowercase().as_str() {
        "delivered" => SendStatus::Delivered,
        "processed" | "accepted" | "sent" => SendStatus::Sent,
        "bounce" | "bounced" => SendStatus::Bounced,
        "deferred" => SendStatus::Deferred,
        "dropped" => SendStatus::Dropped,
        "failed" => SendStatus::Failed,
        _ => SendStatus::Processing,
    }
}

/// Map a webhook event name onto the internal send status. Engagement
/// events imply delivery. `None` for event types that carry no delivery
/// signal (spam reports, unsubscribes, ...).
#[must_use]
pub fn map_webhook_event(event: &str) -> Option<SendStatus> {
    match event.to_ascii_lowercase().as_str() {
        "delivered" | "open" | "click" => Some(SendStatus::Delivered),
        "bounce" => Some(SendStatus::Bounced),
        "dropped" => Some(SendStatus::Dropped),
        "deferred" => Some(SendStatus::Deferred),
        "processed" | "sent" => Some(SendStatus::Sent),
        _ => None,
    }
}
