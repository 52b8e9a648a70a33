use async_trait::async_trait;

use cadence_core::{Contact, ContactId, EmailType, OrgId};
use chrono::NaiveDate;

use crate::error::{DirectoryError, ProviderError, RenderError};
use crate::types::{MessageStatus, OutboundEmail, RenderedEmail, SendReceipt};

/// The external email provider, reduced to the two calls the pipeline
/// needs. The concrete HTTP client lives outside the core.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Dispatch one message. With `dry_run` the provider must not emit
    /// anything but still answers as if it had.
    async fn send(&self, message: &OutboundEmail, dry_run: bool)
    -> Result<SendReceipt, ProviderError>;

    /// Query delivery status for a previously accepted message.
    async fn query_message(&self, message_id: &str) -> Result<MessageStatus, ProviderError>;
}

/// Looks up contacts for the executor and reconciler.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Fetch one contact. Missing contacts are an error, not an option:
    /// a tracked row always refers to a contact that existed at batch time.
    async fn get_contact(
        &self,
        org_id: OrgId,
        contact_id: &ContactId,
    ) -> Result<Contact, DirectoryError>;
}

/// The external email templater.
pub trait EmailRenderer: Send + Sync {
    /// Render subject and bodies for one email. `want_html` requests an
    /// additional HTML body.
    fn render(
        &self,
        email_type: EmailType,
        contact: &Contact,
        date: NaiveDate,
        want_html: bool,
    ) -> Result<RenderedEmail, RenderError>;
}
