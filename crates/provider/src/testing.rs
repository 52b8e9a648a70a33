//! In-memory collaborator doubles shared by the executor and reconciler
//! test suites.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;

use cadence_core::{Contact, ContactId, EmailType, OrgId};

use crate::error::{DirectoryError, ProviderError, RenderError};
use crate::provider::{ContactDirectory, EmailProvider, EmailRenderer};
use crate::types::{MessageStatus, OutboundEmail, RenderedEmail, SendReceipt};

/// One recorded dispatch through the [`MockProvider`].
#[derive(Debug, Clone)]
pub struct RecordedSend {
    pub message: OutboundEmail,
    pub dry_run: bool,
    pub message_id: String,
}

/// Scriptable in-memory email provider.
///
/// Accepts everything by default, assigning sequential `mock-N` message
/// ids. Individual recipients can be scripted to be rejected or to raise
/// transport errors, and per-message statuses can be planted for
/// `query_message`.
#[derive(Debug, Default)]
pub struct MockProvider {
    sends: Mutex<Vec<RecordedSend>>,
    rejected_recipients: Mutex<Vec<String>>,
    failing_recipients: Mutex<Vec<String>>,
    statuses: Mutex<HashMap<String, String>>,
    counter: AtomicU64,
}

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the provider to reject sends addressed to `recipient`.
    pub fn reject_recipient(&self, recipient: impl Into<String>) {
        self.rejected_recipients
            .lock()
            .expect("lock poisoned")
            .push(recipient.into());
    }

    /// Script the provider to raise a connection error for `recipient`.
    pub fn fail_recipient(&self, recipient: impl Into<String>) {
        self.failing_recipients
            .lock()
            .expect("lock poisoned")
            .push(recipient.into());
    }

    /// Plant a provider status answer for one message id.
    pub fn set_status(&self, message_id: impl Into<String>, status: impl Into<String>) {
        self.statuses
            .lock()
            .expect("lock poisoned")
            .insert(message_id.into(), status.into());
    }

    /// Every dispatch recorded so far, in order.
    #[must_use]
    pub fn sends(&self) -> Vec<RecordedSend> {
        self.sends.lock().expect("lock poisoned").clone()
    }

    /// Number of dispatches that were NOT dry runs.
    #[must_use]
    pub fn live_send_count(&self) -> usize {
        self.sends
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|s| !s.dry_run)
            .count()
    }
}

#[async_trait]
impl EmailProvider for MockProvider {
    async fn send(
        &self,
        message: &OutboundEmail,
        dry_run: bool,
    ) -> Result<SendReceipt, ProviderError> {
        if self
            .failing_recipients
            .lock()
            .expect("lock poisoned")
            .contains(&message.to)
        {
            return Err(ProviderError::Connection("connection reset".into()));
        }

        if self
            .rejected_recipients
            .lock()
            .expect("lock poisoned")
            .contains(&message.to)
        {
            return Ok(SendReceipt::rejected(format!(
                "recipient refused: {}",
                message.to
            )));
        }

        let id = format!("mock-{}", self.counter.fetch_add(1, Ordering::SeqCst));
        self.sends.lock().expect("lock poisoned").push(RecordedSend {
            message: message.clone(),
            dry_run,
            message_id: id.clone(),
        });
        Ok(SendReceipt::accepted(Some(id)))
    }

    async fn query_message(&self, message_id: &str) -> Result<MessageStatus, ProviderError> {
        let status = self
            .statuses
            .lock()
            .expect("lock poisoned")
            .get(message_id)
            .cloned()
            .unwrap_or_else(|| "processed".to_owned());
        Ok(MessageStatus {
            raw: serde_json::json!({ "message_id": message_id, "status": status }),
            status,
        })
    }
}

/// Fixed-content renderer. Can be scripted to fail for chosen email types.
#[derive(Debug, Default)]
pub struct StaticRenderer {
    failing_types: Vec<EmailType>,
}

impl StaticRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make rendering fail for `email_type`.
    #[must_use]
    pub fn failing_for(mut self, email_type: EmailType) -> Self {
        self.failing_types.push(email_type);
        self
    }
}

impl EmailRenderer for StaticRenderer {
    fn render(
        &self,
        email_type: EmailType,
        contact: &Contact,
        date: NaiveDate,
        want_html: bool,
    ) -> Result<RenderedEmail, RenderError> {
        if self.failing_types.contains(&email_type) {
            return Err(RenderError::new(format!(
                "no template for {email_type}"
            )));
        }
        let subject = format!("Your {email_type} update");
        let text_body = format!("Hello {}, mark {date} in your calendar.", contact.full_name());
        Ok(RenderedEmail {
            html_body: want_html.then(|| format!("<p>{text_body}</p>")),
            subject,
            text_body,
        })
    }
}

/// Hash-map backed contact directory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    contacts: Mutex<HashMap<(OrgId, ContactId), Contact>>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, contact: Contact) {
        self.contacts
            .lock()
            .expect("lock poisoned")
            .insert((contact.org_id, contact.id.clone()), contact);
    }
}

#[async_trait]
impl ContactDirectory for InMemoryDirectory {
    async fn get_contact(
        &self,
        org_id: OrgId,
        contact_id: &ContactId,
    ) -> Result<Contact, DirectoryError> {
        self.contacts
            .lock()
            .expect("lock poisoned")
            .get(&(org_id, contact_id.clone()))
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> OutboundEmail {
        OutboundEmail {
            from_addr: "noreply@example.com".into(),
            from_name: "Cadence".into(),
            to: to.into(),
            subject: "s".into(),
            text: "t".into(),
            html: None,
        }
    }

    #[tokio::test]
    async fn mock_provider_accepts_by_default() {
        let provider = MockProvider::new();
        let receipt = provider.send(&message("a@example.com"), false).await.unwrap();
        assert!(receipt.accepted);
        assert!(receipt.message_id.unwrap().starts_with("mock-"));
        assert_eq!(provider.live_send_count(), 1);
    }

    #[tokio::test]
    async fn mock_provider_scripted_rejection() {
        let provider = MockProvider::new();
        provider.reject_recipient("bad@example.com");
        let receipt = provider.send(&message("bad@example.com"), false).await.unwrap();
        assert!(!receipt.accepted);
        assert!(receipt.error.unwrap().contains("bad@example.com"));
    }

    #[tokio::test]
    async fn mock_provider_scripted_error() {
        let provider = MockProvider::new();
        provider.fail_recipient("down@example.com");
        let err = provider
            .send(&message("down@example.com"), false)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn mock_provider_status_queries() {
        let provider = MockProvider::new();
        provider.set_status("mock-0", "delivered");
        let status = provider.query_message("mock-0").await.unwrap();
        assert_eq!(status.status, "delivered");
        let unknown = provider.query_message("other").await.unwrap();
        assert_eq!(unknown.status, "processed");
    }

    #[test]
    fn static_renderer_html_flag() {
        let renderer = StaticRenderer::new();
        let contact = Contact::new("1", 1, "a@example.com").with_name("Ada", "Lovelace");
        let date = NaiveDate::from_ymd_opt(2024, 8, 18).unwrap();

        let plain = renderer
            .render(EmailType::Aep, &contact, date, false)
            .unwrap();
        assert!(plain.html_body.is_none());

        let html = renderer
            .render(EmailType::Aep, &contact, date, true)
            .unwrap();
        assert!(html.html_body.unwrap().contains("Ada Lovelace"));
    }

    #[test]
    fn static_renderer_scripted_failure() {
        let renderer = StaticRenderer::new().failing_for(EmailType::Birthday);
        let contact = Contact::new("1", 1, "a@example.com");
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let err = renderer
            .render(EmailType::Birthday, &contact, date, false)
            .unwrap_err();
        assert!(err.to_string().contains("birthday"));
    }

    #[tokio::test]
    async fn directory_round_trip() {
        let directory = InMemoryDirectory::new();
        directory.insert(Contact::new("7", 3, "c@example.com"));

        let found = directory
            .get_contact(OrgId::new(3), &ContactId::from("7"))
            .await
            .unwrap();
        assert_eq!(found.email, "c@example.com");

        let missing = directory
            .get_contact(OrgId::new(3), &ContactId::from("8"))
            .await;
        assert!(matches!(missing, Err(DirectoryError::NotFound)));
    }
}
