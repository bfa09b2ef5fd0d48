//! Lazily opened, shared gateway session.
use crate::{
    config::GatewayOptions,
    error::{ClientError, Result},
    gateway::{Connector, Session},
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Owns at most one live [`Session`].
///
/// The slot lock is held while connecting, so concurrent callers of
/// [`ensure_connected`](Self::ensure_connected) wait for the attempt in flight
/// instead of opening a second session.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    options: GatewayOptions,
    session: Mutex<Option<Arc<C::Session>>>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a manager; nothing is opened until first use.
    pub fn new(connector: C, options: GatewayOptions) -> Self {
        Self {
            connector,
            options,
            session: Mutex::new(None),
        }
    }

    /// Options used for every connect.
    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// Return the live session, opening it first if needed.
    ///
    /// # Errors
    /// [`ClientError::Connection`] if the connector fails; the manager stays
    /// disconnected and the next call tries again.
    pub async fn ensure_connected(&self) -> Result<Arc<C::Session>> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        tracing::info!(identity = %self.options.identity, "connecting gateway");
        let session = self
            .connector
            .connect(&self.options)
            .await
            .map_err(ClientError::Connection)?;
        let session = Arc::new(session);
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Current session without connecting.
    pub async fn current(&self) -> Option<Arc<C::Session>> {
        self.session.lock().await.clone()
    }

    /// Whether a session is open.
    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Close and forget the session; no-op when already disconnected.
    ///
    /// Callers remove every listener first.
    pub async fn disconnect(&self) -> Result<()> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };
        tracing::info!(identity = %self.options.identity, "disconnecting gateway");
        session.disconnect().await.map_err(ClientError::Connection)
    }
}
