use thiserror::Error;

/// Errors raised while loading or validating the rule configuration.
///
/// All variants are fatal: a process with an invalid rule document must not
/// start scheduling.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error loading configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing configuration: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    #[error("{context}: {reason}")]
    InvalidDateOverride { context: String, reason: String },

    #[error("timing constant {0} must be a non-negative integer")]
    InvalidTimingConstant(String),

    #[error("invalid AEP config: {0}")]
    InvalidAepConfig(String),

    #[error("invalid rule for state {state}: {reason}")]
    InvalidStateRule { state: String, reason: String },

    #[error("invalid rule for contact {contact}: {reason}")]
    InvalidContactRule { contact: String, reason: String },
}

impl ConfigError {
    pub(crate) fn date_override(context: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidDateOverride {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn state_rule(state: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidStateRule {
            state: state.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn contact_rule(contact: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidContactRule {
            contact: contact.into(),
            reason: reason.into(),
        }
    }
}
