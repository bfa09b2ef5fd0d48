//! Options handed to the gateway when the shared session is opened.
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// What the gateway waits for after submitting a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventHandling {
    /// Return without waiting for commit events (suitable for listener sessions).
    #[default]
    None,
    /// Wait for the peers' commit events.
    WaitForCommit,
}

/// Session options. The identity must already be enrolled in the wallet the
/// [`Connector`](crate::gateway::Connector) uses.
///
/// ```json
/// { "identity": "appUser", "as_localhost": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOptions {
    /// Wallet label of the identity to connect as.
    pub identity: String,
    /// Use service discovery to locate peers.
    #[serde(default = "default_discovery")]
    pub discovery_enabled: bool,
    /// Rewrite discovered addresses to localhost (network deployed locally).
    #[serde(default)]
    pub as_localhost: bool,
    /// Commit strategy for the session.
    #[serde(default)]
    pub event_handling: EventHandling,
}

fn default_discovery() -> bool {
    true
}

impl GatewayOptions {
    /// Defaults for `identity`: discovery on, not localhost, no commit waiting.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            discovery_enabled: true,
            as_localhost: false,
            event_handling: EventHandling::None,
        }
    }

    /// Toggle localhost address rewriting.
    pub fn with_localhost(mut self, as_localhost: bool) -> Self {
        self.as_localhost = as_localhost;
        self
    }

    /// Parse options from JSON text.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let opts: Self = serde_json::from_str(s)?;
        opts.validate()?;
        Ok(opts)
    }

    /// Read options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loaded gateway options");
        Self::from_json_str(&contents)
    }

    fn validate(&self) -> Result<()> {
        if self.identity.trim().is_empty() {
            return Err(crate::ClientError::Config("identity must not be empty".into()));
        }
        Ok(())
    }
}
