use serde::{Deserialize, Serialize};

/// Environment variable holding the provider API key.
pub const API_KEY_VAR: &str = "SENDGRID_API_KEY";
/// Environment variable holding the webhook signing key.
pub const WEBHOOK_KEY_VAR: &str = "SENDGRID_WEBHOOK_KEY";
/// Environment variable overriding the sender address.
pub const FROM_EMAIL_VAR: &str = "FROM_EMAIL";
/// Environment variable overriding the sender display name.
pub const FROM_NAME_VAR: &str = "FROM_NAME";
/// Environment variable selecting the default dry-run policy.
pub const DRY_RUN_VAR: &str = "EMAIL_DRY_RUN";

/// Sender identity and provider credentials, usually sourced from the
/// environment at startup.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    /// Provider API key. Absent keys force dry-run behavior downstream.
    pub api_key: Option<String>,

    /// The `From` address used in outgoing emails.
    pub from_email: String,

    /// The `From` display name used in outgoing emails.
    pub from_name: String,

    /// Default dry-run policy when no explicit gate applies.
    pub dry_run: bool,
}

impl std::fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            from_email: "noreply@example.com".to_owned(),
            from_name: "Cadence Mailer".to_owned(),
            dry_run: true,
        }
    }
}

impl EmailSettings {
    /// Read settings from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var(API_KEY_VAR).ok().filter(|k| !k.is_empty()),
            from_email: std::env::var(FROM_EMAIL_VAR).unwrap_or(defaults.from_email),
            from_name: std::env::var(FROM_NAME_VAR).unwrap_or(defaults.from_name),
            dry_run: std::env::var(DRY_RUN_VAR)
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(defaults.dry_run),
        }
    }

    #[must_use]
    pub fn with_sender(mut self, email: impl Into<String>, name: impl Into<String>) -> Self {
        self.from_email = email.into();
        self.from_name = name.into();
        self
    }
}
