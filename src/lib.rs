#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! fabric-listener: contract and block event subscriptions over one shared
//! ledger gateway session, plus block/transaction checkpointing.
//!
//! ## What you implement
//! - [`Connector`]: open an authenticated [`Session`] (wallet, identity and connection profile live here).
//! - [`Session`] / [`Network`] / [`Contract`]: thin wrappers over your ledger SDK's channel,
//!   contract and listener calls.
//! - [`ContractEventHandler`] / [`BlockEventHandler`]: your event callbacks.
//!
//! ## What the client does
//! - Opens the session lazily on the first subscription and shares it.
//! - Keeps a per-channel, per-stream registry of attached listeners.
//! - Replays listeners from an earlier block without duplicating them.
//! - Detaches everything (per channel or globally) and closes the session.
//!
//! [`Checkpointer`] tracks the last block and the transactions handled in it;
//! update it from your callbacks and persist it with a [`CheckpointStore`] if needed.
//!
//! ## Minimal usage
//! ```rust,ignore
//! use fabric_listener::prelude::*;
//! use std::sync::{Arc, Mutex};
//!
//! struct Printer {
//!     checkpoint: Mutex<Checkpointer>,
//! }
//!
//! #[async_trait::async_trait]
//! impl BlockEventHandler for Printer {
//!     async fn on_block(&self, block: BlockEvent) -> anyhow::Result<()> {
//!         let mut cp = self.checkpoint.lock().unwrap();
//!         cp.advance_to(block.block_number);
//!         for tx in block.transaction_ids {
//!             cp.record_transaction(tx);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! async fn run(connector: impl Connector) -> fabric_listener::Result<()> {
//!     let client = EventClient::new(connector, GatewayOptions::new("appUser"));
//!     let printer = Arc::new(Printer { checkpoint: Mutex::new(Checkpointer::new(false)) });
//!
//!     client
//!         .subscribe_to_block_events("retail", printer, Some(10), BlockEventKind::Full)
//!         .await?;
//!     client.replay_block_events("retail", 0, BlockEventKind::Full).await?;
//!     client.disconnect_all().await
//! }
//! ```
/// Block pointer and processed transaction IDs.
pub mod checkpointer;

/// Subscription façade over the shared session.
pub mod client;

/// Gateway options and their JSON loading.
pub mod config;

/// Lazily opened, shared gateway session.
pub mod connection;

/// Error type and result alias.
pub mod error;

/// Ledger events and callback traits.
pub mod events;

/// Ledger SDK abstractions (session, channel, contract, listeners).
pub mod gateway;

/// Channel/stream listener registry.
pub mod registry;

/// Checkpoint persistence (traits and SQLite implementation).
pub mod store;

// Public re-exports
pub use checkpointer::{CheckpointState, Checkpointer};
pub use client::{DisconnectMode, EventClient};
pub use config::{EventHandling, GatewayOptions};
pub use connection::ConnectionManager;
pub use error::{ClientError, Result};
pub use events::{
    BlockEvent, BlockEventHandler, BlockEventKind, BlockListener, ContractEvent,
    ContractEventHandler, ContractListener,
};
pub use gateway::{BlockListenerOptions, Connector, Contract, ListenerOptions, Network, Session};
pub use registry::{EventRegistry, Registration, RegistrationInfo, StreamKey};
#[cfg(feature = "store-sqlite")]
pub use store::SqliteCheckpointStore;
pub use store::CheckpointStore;

/// Convenience prelude for end users.
pub mod prelude {
    pub use crate::{
        BlockEvent, BlockEventHandler, BlockEventKind, CheckpointStore, Checkpointer, Connector,
        ContractEvent, ContractEventHandler, DisconnectMode, EventClient, GatewayOptions,
    };
}
