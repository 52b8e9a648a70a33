use cadence_core::SendMode;

/// Environment gate for test-mode real sends.
pub const TEST_GATE_VAR: &str = "TEST_EMAIL_SENDING";
/// Environment gate for production-mode real sends.
pub const PRODUCTION_GATE_VAR: &str = "PRODUCTION_EMAIL_SENDING";

/// Process-wide send gates.
///
/// Each send mode has an independent `ENABLED`/`DISABLED` switch. Test
/// sending defaults to enabled, production sending to disabled, so a
/// misconfigured process can at worst mail the test recipient. Gates are
/// consulted at the point of each send, not cached, so flipping an
/// environment variable takes effect on the next dispatch.
#[derive(Debug, Clone, Default)]
pub struct SendPolicy {
    /// Fixed answer for test mode, bypassing the environment. For tests
    /// and embedding callers that manage their own switches.
    pub test_override: Option<bool>,
    /// Fixed answer for production mode, bypassing the environment.
    pub production_override: Option<bool>,
}

impl SendPolicy {
    /// Policy that always consults the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Policy with fixed answers, independent of the environment.
    #[must_use]
    pub fn fixed(test: bool, production: bool) -> Self {
        Self {
            test_override: Some(test),
            production_override: Some(production),
        }
    }

    /// Whether a real send may be emitted in `mode` right now. A `false`
    /// answer demotes the send to a dry run; the row is still marked sent.
    #[must_use]
    pub fn allows(&self, mode: SendMode) -> bool {
        match mode {
            SendMode::Test => self
                .test_override
                .unwrap_or_else(|| gate_enabled(TEST_GATE_VAR, true)),
            SendMode::Production => self
                .production_override
                .unwrap_or_else(|| gate_enabled(PRODUCTION_GATE_VAR, false)),
        }
    }
}

fn gate_enabled(var: &str, default: bool) -> bool {
    match std::env::var(var) {
        Ok(value) => value.to_uppercase() == "ENABLED",
        Err(_) => default,
    }
}
