//! Ledger events and the callbacks that receive them.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Content delivered for each committed block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockEventKind {
    /// Full block contents.
    #[default]
    Full,
    /// Full block plus private data the identity may read.
    Private,
}

impl BlockEventKind {
    /// `Private` when `include_private` is set, `Full` otherwise.
    pub fn from_private_flag(include_private: bool) -> Self {
        if include_private {
            BlockEventKind::Private
        } else {
            BlockEventKind::Full
        }
    }
}

impl fmt::Display for BlockEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockEventKind::Full => f.write_str("full"),
            BlockEventKind::Private => f.write_str("private"),
        }
    }
}

/// An application event emitted by a smart contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractEvent {
    /// Contract that emitted the event.
    pub contract: String,
    /// Name the contract gave the event.
    pub event_name: String,
    /// Transaction that produced it.
    pub transaction_id: String,
    /// Block the transaction was committed in.
    pub block_number: u64,
    /// Opaque event payload.
    pub payload: Vec<u8>,
}

/// A committed block as seen by a block listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEvent {
    /// Block height.
    pub block_number: u64,
    /// Which block content was requested.
    pub kind: BlockEventKind,
    /// Transactions contained in the block, in order.
    pub transaction_ids: Vec<String>,
    /// Raw encoded block as handed over by the network layer.
    pub payload: Vec<u8>,
}

/// Receives contract events.
#[async_trait]
pub trait ContractEventHandler: Send + Sync {
    /// Called once per contract event, in network order.
    async fn on_event(&self, event: ContractEvent) -> anyhow::Result<()>;
}

/// Receives block events.
#[async_trait]
pub trait BlockEventHandler: Send + Sync {
    /// Called once per committed block, in network order.
    async fn on_block(&self, event: BlockEvent) -> anyhow::Result<()>;
}

/// Shared contract callback. The `Arc` itself is the listener's identity.
pub type ContractListener = Arc<dyn ContractEventHandler>;

/// Shared block callback. The `Arc` itself is the listener's identity.
pub type BlockListener = Arc<dyn BlockEventHandler>;

/// Identity comparison for shared callbacks (data pointer only, vtables ignored).
pub fn same_listener<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
