//! Error types surfaced by the subscription layer.
use crate::registry::StreamKey;
use thiserror::Error;

/// Errors returned by [`EventClient`](crate::EventClient) and its building blocks.
///
/// Collaborator failures arrive as [`anyhow::Error`] and are kept as the error source.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The gateway could not open (or keep) the shared session.
    #[error("failed to connect to the ledger gateway")]
    Connection(#[source] anyhow::Error),

    /// A network-layer call failed for a channel.
    #[error("{operation} failed on channel `{channel}`")]
    Network {
        /// Channel the call targeted.
        channel: String,
        /// Short name of the failed call, e.g. `add_contract_listener`.
        operation: &'static str,
        /// Collaborator error.
        #[source]
        source: anyhow::Error,
    },

    /// The listener is already registered on this channel/stream.
    #[error("listener already registered on `{channel}` / {stream}")]
    DuplicateListener {
        /// Channel name.
        channel: String,
        /// Stream the listener is registered on.
        stream: StreamKey,
    },

    /// Registry and network layer disagree about a registration.
    #[error("registry inconsistency on `{channel}` / {stream}: {detail}")]
    RegistryInconsistency {
        /// Channel name.
        channel: String,
        /// Affected stream.
        stream: StreamKey,
        /// What went out of sync.
        detail: String,
    },

    /// A detached subscription task panicked or was aborted.
    #[error("subscription task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Gateway options could not be loaded.
    #[error("invalid gateway options: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn network(
        channel: &str,
        operation: &'static str,
        source: anyhow::Error,
    ) -> Self {
        ClientError::Network {
            channel: channel.to_string(),
            operation,
            source,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Config(e.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Config(e.to_string())
    }
}

/// Result alias for subscription operations.
pub type Result<T> = std::result::Result<T, ClientError>;
