//! Abstractions over the ledger SDK: opening a session, resolving channels and
//! contracts, and attaching/detaching listeners.
//!
//! Listener removal matches by callback identity, so implementations must compare
//! the `Arc`s they were given (see [`same_listener`](crate::events::same_listener)).
use crate::{
    config::GatewayOptions,
    events::{BlockEventKind, BlockListener, ContractListener},
};
use async_trait::async_trait;

/// Options for attaching a contract listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// First block to deliver; `None` means from the current chain tip.
    pub start_block: Option<u64>,
}

/// Options for attaching a block listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockListenerOptions {
    /// First block to deliver; `None` means from the current chain tip.
    pub start_block: Option<u64>,
    /// Full or private block content.
    pub kind: BlockEventKind,
}

/// Identity/connection provider: owns the connection profile and the wallet.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Live session type produced by [`connect`](Self::connect).
    type Session: Session;

    /// Open an authenticated session.
    async fn connect(&self, options: &GatewayOptions) -> anyhow::Result<Self::Session>;
}

/// One authenticated, live gateway session.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Channel handle type.
    type Network: Network;

    /// Resolve a channel by name.
    async fn network(&self, channel: &str) -> anyhow::Result<Self::Network>;

    /// Close the session. Called once, after every listener was removed.
    async fn disconnect(&self) -> anyhow::Result<()>;
}

/// A channel as seen through the session.
#[async_trait]
pub trait Network: Send + Sync {
    /// Contract handle type.
    type Contract: Contract;

    /// Look up a contract deployed on this channel.
    fn contract(&self, name: &str) -> Self::Contract;

    /// Attach a block listener.
    async fn add_block_listener(
        &self,
        listener: &BlockListener,
        options: BlockListenerOptions,
    ) -> anyhow::Result<()>;

    /// Detach a block listener previously attached with the same `Arc`.
    ///
    /// Succeeds when the listener is not attached. An error means it may
    /// still be attached.
    async fn remove_block_listener(&self, listener: &BlockListener) -> anyhow::Result<()>;
}

/// A smart contract on a channel.
#[async_trait]
pub trait Contract: Send + Sync {
    /// Attach a contract event listener.
    async fn add_contract_listener(
        &self,
        listener: &ContractListener,
        options: ListenerOptions,
    ) -> anyhow::Result<()>;

    /// Detach a contract listener previously attached with the same `Arc`.
    ///
    /// Succeeds when the listener is not attached. An error means it may
    /// still be attached.
    async fn remove_contract_listener(&self, listener: &ContractListener) -> anyhow::Result<()>;
}
