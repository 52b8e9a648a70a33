//! Delivery-status reconciliation.
//!
//! Two idempotent input paths advance tracking rows toward terminal
//! states: [`StatusChecker`] pulls statuses from the provider's query API,
//! [`WebhookHandler`] applies pushed provider events after verifying the
//! payload signature. Both only transition rows out of
//! `sent|deferred|accepted`, so they never race the send executor.

pub mod checker;
pub mod error;
pub mod mapping;
pub mod webhook;

pub use checker::{StatusChecker, StatusDetail, StatusReport};
pub use error::{AuthError, StatusError};
pub use mapping::{map_provider_status, map_webhook_event};
pub use webhook::{WebhookHandler, WebhookReport};
