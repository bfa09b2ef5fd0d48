//! Subscription façade: contract/block subscriptions over one shared gateway session.
use crate::{
    config::GatewayOptions,
    connection::ConnectionManager,
    error::{ClientError, Result},
    events::{BlockEventKind, BlockListener, ContractListener},
    gateway::{BlockListenerOptions, Connector, Contract, ListenerOptions, Network, Session},
    registry::{EventRegistry, ListenerBinder, Registration, RegistrationInfo, StreamKey},
};
use async_trait::async_trait;
use std::{future::Future, sync::Arc};
use tokio::sync::Mutex;

/// What [`EventClient::disconnect_channel`] does with the channel's registrations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisconnectMode {
    /// Detach and forget them.
    #[default]
    Remove,
    /// Detach but keep them for [`EventClient::resume_channel`].
    Pause,
}

/// Event subscriptions for many channels over one lazily opened session.
///
/// Every mutating call runs to completion on a detached task, so dropping the
/// returned future never leaves the registry and the network layer out of step.
/// A single lock serializes subscribe, replay and disconnect.
pub struct EventClient<C: Connector> {
    inner: Arc<Inner<C>>,
}

struct Inner<C: Connector> {
    connection: ConnectionManager<C>,
    registry: Mutex<EventRegistry>,
}

impl<C: Connector> EventClient<C> {
    /// Create a client. No session is opened until the first subscription.
    pub fn new(connector: C, options: GatewayOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                connection: ConnectionManager::new(connector, options),
                registry: Mutex::new(EventRegistry::new()),
            }),
        }
    }

    /// Listen to events of `contract` on `channel`, optionally from `start_block`.
    ///
    /// # Errors
    /// - [`ClientError::Connection`] if the session cannot be opened.
    /// - [`ClientError::Network`] if the listener cannot be attached; nothing is recorded.
    /// - [`ClientError::DuplicateListener`] if `listener` already listens to that contract.
    pub async fn subscribe_to_contract_events(
        &self,
        channel: &str,
        contract: &str,
        listener: ContractListener,
        start_block: Option<u64>,
    ) -> Result<()> {
        let channel = channel.to_string();
        let registration = Registration::Contract {
            contract: contract.to_string(),
            listener,
            start_block,
        };
        self.detached(move |inner| async move { inner.subscribe(channel, registration).await })
            .await
    }

    /// Listen to every block committed on `channel`, optionally from `start_block`.
    ///
    /// # Errors
    /// Same as [`subscribe_to_contract_events`](Self::subscribe_to_contract_events).
    pub async fn subscribe_to_block_events(
        &self,
        channel: &str,
        listener: BlockListener,
        start_block: Option<u64>,
        kind: BlockEventKind,
    ) -> Result<()> {
        let channel = channel.to_string();
        let registration = Registration::Block {
            listener,
            kind,
            start_block,
        };
        self.detached(move |inner| async move { inner.subscribe(channel, registration).await })
            .await
    }

    /// Re-attach every listener of `contract` on `channel` from `start_block`.
    /// Returns how many listeners were replayed; zero if there were none.
    pub async fn replay_contract_events(
        &self,
        channel: &str,
        contract: &str,
        start_block: u64,
    ) -> Result<usize> {
        let channel = channel.to_string();
        let stream = StreamKey::Contract(contract.to_string());
        self.detached(move |inner| async move {
            inner.replay(channel, stream, start_block, None).await
        })
        .await
    }

    /// Re-attach every block listener on `channel` from `start_block`, switching them to `kind`.
    pub async fn replay_block_events(
        &self,
        channel: &str,
        start_block: u64,
        kind: BlockEventKind,
    ) -> Result<usize> {
        let channel = channel.to_string();
        self.detached(move |inner| async move {
            inner
                .replay(channel, StreamKey::Blocks, start_block, Some(kind))
                .await
        })
        .await
    }

    /// Detach every listener on `channel`. The session is closed once no
    /// channel has active listeners left.
    ///
    /// # Errors
    /// The first failed removal; the remaining listeners are still detached.
    pub async fn disconnect_channel(&self, channel: &str, mode: DisconnectMode) -> Result<()> {
        let channel = channel.to_string();
        self.detached(move |inner| async move {
            let mut registry = inner.registry.lock().await;
            let detached = inner.detach_channel(&mut registry, &channel, mode).await;
            let closed = if registry.is_empty() {
                inner.connection.disconnect().await
            } else {
                Ok(())
            };
            detached.and(closed)
        })
        .await
    }

    /// Re-attach listeners parked by [`DisconnectMode::Pause`]. Returns how many were attached.
    pub async fn resume_channel(&self, channel: &str) -> Result<usize> {
        let channel = channel.to_string();
        self.detached(move |inner| async move { inner.resume(channel).await })
            .await
    }

    /// Detach every listener on every channel, drop paused ones, and close the session.
    pub async fn disconnect_all(&self) -> Result<()> {
        self.detached(|inner| async move {
            let mut registry = inner.registry.lock().await;
            let mut result = Ok(());
            for channel in registry.channels() {
                let detached = inner
                    .detach_channel(&mut registry, &channel, DisconnectMode::Remove)
                    .await;
                result = result.and(detached);
            }
            registry.discard_paused(None);
            result.and(inner.connection.disconnect().await)
        })
        .await
    }

    /// Whether the shared session is open.
    pub async fn is_connected(&self) -> bool {
        self.inner.connection.is_connected().await
    }

    /// Channels with active listeners.
    pub async fn channels(&self) -> Vec<String> {
        self.inner.registry.lock().await.channels()
    }

    /// Channels holding paused listeners.
    pub async fn paused_channels(&self) -> Vec<String> {
        self.inner.registry.lock().await.paused_channels()
    }

    /// Active listeners of `channel`.
    pub async fn registrations(&self, channel: &str) -> Vec<RegistrationInfo> {
        self.inner.registry.lock().await.snapshot(channel)
    }

    async fn detached<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<Inner<C>>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(op(self.inner.clone())).await?
    }
}

impl<C: Connector> Inner<C> {
    async fn subscribe(&self, channel: String, registration: Registration) -> Result<()> {
        let mut registry = self.registry.lock().await;
        if registry.contains(&channel, &registration) {
            return Err(ClientError::DuplicateListener {
                channel,
                stream: registration.stream_key(),
            });
        }

        let session = self.connection.ensure_connected().await?;
        SessionBinder::new(&*session)
            .bind(&channel, &registration)
            .await
            .map_err(|e| ClientError::network(&channel, registration.add_operation(), e))?;

        tracing::debug!(
            channel = %channel,
            stream = %registration.stream_key(),
            start_block = ?registration.start_block(),
            "listener attached"
        );
        registry.add(&channel, registration)
    }

    async fn replay(
        &self,
        channel: String,
        stream: StreamKey,
        start_block: u64,
        kind: Option<BlockEventKind>,
    ) -> Result<usize> {
        let mut registry = self.registry.lock().await;
        if !registry.has_stream(&channel, &stream) {
            tracing::debug!(channel = %channel, stream = %stream, "no listeners to replay");
            return Ok(0);
        }

        let session = self.connection.ensure_connected().await?;
        let binder = SessionBinder::new(&*session);
        registry
            .replay(&channel, &stream, Some(start_block), kind, &binder)
            .await
    }

    async fn resume(&self, channel: String) -> Result<usize> {
        let mut registry = self.registry.lock().await;
        let parked = registry.take_paused(&channel);
        if parked.is_empty() {
            return Ok(0);
        }
        let mut parked = parked.into_iter();

        let session = match self.connection.ensure_connected().await {
            Ok(session) => session,
            Err(e) => {
                registry.pause(&channel, parked);
                return Err(e);
            }
        };
        let binder = SessionBinder::new(&*session);

        let mut resumed = 0;
        while let Some(registration) = parked.next() {
            if registry.contains(&channel, &registration) {
                tracing::debug!(
                    channel = %channel,
                    stream = %registration.stream_key(),
                    "listener already active, not resuming"
                );
                continue;
            }
            if let Err(e) = binder.bind(&channel, &registration).await {
                let err = ClientError::network(&channel, registration.add_operation(), e);
                registry.pause(&channel, std::iter::once(registration).chain(parked));
                return Err(err);
            }
            registry.add(&channel, registration)?;
            resumed += 1;
        }

        tracing::info!(channel = %channel, resumed, "channel resumed");
        Ok(resumed)
    }

    /// Detach the channel's listeners and take them out of the registry.
    async fn detach_channel(
        &self,
        registry: &mut EventRegistry,
        channel: &str,
        mode: DisconnectMode,
    ) -> Result<()> {
        let removed = registry.remove_all(Some(channel));
        if mode == DisconnectMode::Remove {
            registry.discard_paused(Some(channel));
        }
        if removed.is_empty() {
            tracing::debug!(channel, "no listeners to detach");
            return Ok(());
        }

        let total = removed.len();
        let mut result = Ok(());
        let mut detached = Vec::with_capacity(total);
        match self.connection.current().await {
            Some(session) => {
                let binder = SessionBinder::new(&*session);
                for (_, registration) in removed {
                    match binder.unbind(channel, &registration).await {
                        Ok(()) => detached.push(registration),
                        Err(e) => {
                            let err =
                                ClientError::network(channel, registration.remove_operation(), e);
                            tracing::warn!(error = %err, "listener removal failed");
                            if result.is_ok() {
                                result = Err(err);
                            }
                        }
                    }
                }
            }
            None => {
                let err = ClientError::RegistryInconsistency {
                    channel: channel.to_string(),
                    stream: removed[0].1.stream_key(),
                    detail: format!("{total} listener(s) recorded without a session"),
                };
                tracing::warn!(error = %err, "skipping network removal");
                detached.extend(removed.into_iter().map(|(_, r)| r));
            }
        }

        tracing::info!(channel, removed = total, ?mode, "channel disconnected");
        // Only listeners known to be off the network can be resumed later.
        if mode == DisconnectMode::Pause {
            let parked = detached.len();
            registry.pause(channel, detached);
            if parked < total {
                tracing::warn!(channel, parked, total, "some listeners not parked");
            }
        }
        result
    }
}

/// Binds registrations through a live session.
struct SessionBinder<'a, S> {
    session: &'a S,
}

impl<'a, S: Session> SessionBinder<'a, S> {
    fn new(session: &'a S) -> Self {
        Self { session }
    }
}

#[async_trait]
impl<S: Session> ListenerBinder for SessionBinder<'_, S> {
    async fn bind(&self, channel: &str, registration: &Registration) -> anyhow::Result<()> {
        let network = self.session.network(channel).await?;
        match registration {
            Registration::Contract {
                contract,
                listener,
                start_block,
            } => {
                network
                    .contract(contract)
                    .add_contract_listener(
                        listener,
                        ListenerOptions {
                            start_block: *start_block,
                        },
                    )
                    .await
            }
            Registration::Block {
                listener,
                kind,
                start_block,
            } => {
                network
                    .add_block_listener(
                        listener,
                        BlockListenerOptions {
                            start_block: *start_block,
                            kind: *kind,
                        },
                    )
                    .await
            }
        }
    }

    async fn unbind(&self, channel: &str, registration: &Registration) -> anyhow::Result<()> {
        let network = self.session.network(channel).await?;
        match registration {
            Registration::Contract {
                contract, listener, ..
            } => network.contract(contract).remove_contract_listener(listener).await,
            Registration::Block { listener, .. } => network.remove_block_listener(listener).await,
        }
    }
}
