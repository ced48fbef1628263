use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ClientError;

/// Display toggles controlling which event kinds are forwarded to a sink.
///
/// The same shape is used at two levels: system-wide defaults on
/// [`LettaConfig`] and per-run caller overrides on the run builder. The
/// effective policy is the AND of both, so overrides narrow but never widen
/// what the system configuration permits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DisplaySettings {
    /// Master switch for forwarding any event to the sink.
    pub show_events: bool,
    /// Forward reasoning step events.
    pub show_reasoning: bool,
    /// Forward usage statistics events.
    pub show_usage: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_events: true,
            show_reasoning: true,
            show_usage: true,
        }
    }
}

impl DisplaySettings {
    pub fn show_events(mut self, show: bool) -> Self {
        self.show_events = show;
        self
    }

    pub fn show_reasoning(mut self, show: bool) -> Self {
        self.show_reasoning = show;
        self
    }

    pub fn show_usage(mut self, show: bool) -> Self {
        self.show_usage = show;
        self
    }
}

/// Effective display policy for one run, resolved once at run start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayPolicy {
    pub show_events: bool,
    pub show_reasoning: bool,
    pub show_usage: bool,
}

impl DisplayPolicy {
    /// Merges system settings with caller overrides. Overrides can only
    /// narrow: an event kind is forwarded when both levels allow it.
    pub fn resolve(system: &DisplaySettings, overrides: &DisplaySettings) -> Self {
        Self {
            show_events: system.show_events && overrides.show_events,
            show_reasoning: system.show_reasoning && overrides.show_reasoning,
            show_usage: system.show_usage && overrides.show_usage,
        }
    }
}

/// Diagnostic capture settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    /// Destination for the append-only JSONL diagnostic log.
    pub log_path: PathBuf,
}

impl DiagnosticsConfig {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }
}

/// Configuration for the Letta streaming client.
///
/// Values are immutable snapshots: the builder-style setters consume and
/// return the value, and replacing a client's configuration produces a new
/// client without touching runs already in flight.
#[derive(Clone, Debug)]
pub struct LettaConfig {
    /// Base URL of the Letta server.
    pub base_url: String,
    /// Agent whose conversation endpoint is targeted.
    pub agent_id: String,
    /// Shared secret sent in the `X-BARE-PASSWORD` header.
    pub password: String,
    /// Timeout for establishing the connection. The stream itself is
    /// unbounded: agent responses are open-ended.
    pub connect_timeout: Duration,
    /// System-level display defaults, merged with per-run overrides.
    pub display: DisplaySettings,
    /// Optional diagnostic capture of every raw frame, event, and error.
    pub diagnostics: Option<DiagnosticsConfig>,
}

const DEFAULT_BASE_URL: &str = "http://localhost:8283";

impl LettaConfig {
    /// Creates a config with defaults for a local Letta server.
    pub fn new(agent_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            agent_id: agent_id.into(),
            password: password.into(),
            connect_timeout: Duration::from_secs(30),
            display: DisplaySettings::default(),
            diagnostics: None,
        }
    }

    /// Builds a config from `LETTA_AGENT_ID`, `LETTA_PASSWORD` and an
    /// optional `LETTA_BASE_URL` override.
    pub fn from_env() -> Result<Self, ClientError> {
        let agent_id = std::env::var("LETTA_AGENT_ID").unwrap_or_default();
        if agent_id.trim().is_empty() {
            return Err(ClientError::Config(
                "missing LETTA_AGENT_ID for Letta client".into(),
            ));
        }
        let password = std::env::var("LETTA_PASSWORD").unwrap_or_default();
        if password.trim().is_empty() {
            return Err(ClientError::Config(
                "missing LETTA_PASSWORD for Letta client".into(),
            ));
        }
        let mut config = Self::new(agent_id, password);
        if let Ok(base_url) = std::env::var("LETTA_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config.base_url = base_url;
        }
        Ok(config)
    }

    /// Overrides the server base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the connection-establishment timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Replaces the system-level display defaults.
    pub fn display(mut self, display: DisplaySettings) -> Self {
        self.display = display;
        self
    }

    /// Enables diagnostic capture to the given JSONL log path.
    pub fn diagnostics(mut self, diagnostics: DiagnosticsConfig) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub(crate) fn stream_url(&self) -> String {
        format!(
            "{}/v1/agents/{}/messages/stream",
            self.base_url.trim_end_matches('/'),
            self.agent_id
        )
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Config("base_url must not be empty".into()));
        }
        if self.agent_id.trim().is_empty() {
            return Err(ClientError::Config("agent_id must not be empty".into()));
        }
        if self.password.trim().is_empty() {
            return Err(ClientError::Config("password must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_joins_base_and_agent() {
        let config = LettaConfig::new("agent-123", "secret").base_url("https://letta.example.com/");
        assert_eq!(
            config.stream_url(),
            "https://letta.example.com/v1/agents/agent-123/messages/stream"
        );
    }

    #[test]
    fn validate_rejects_blank_fields() {
        assert!(LettaConfig::new("", "secret").validate().is_err());
        assert!(LettaConfig::new("agent", "  ").validate().is_err());
        assert!(LettaConfig::new("agent", "secret").validate().is_ok());
    }

    #[test]
    fn overrides_narrow_but_never_widen() {
        let system = DisplaySettings::default().show_usage(false);
        let overrides = DisplaySettings::default().show_reasoning(false);
        let policy = DisplayPolicy::resolve(&system, &overrides);
        assert!(policy.show_events);
        assert!(!policy.show_reasoning);
        assert!(!policy.show_usage);

        let widening = DisplaySettings::default().show_usage(true);
        let policy = DisplayPolicy::resolve(&system, &widening);
        assert!(!policy.show_usage, "user settings must not widen system ones");
    }
}
