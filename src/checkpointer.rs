//! In-memory delivery progress: the current block plus the transaction IDs
//! already handled inside it.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Serializable snapshot of a [`Checkpointer`].
///
/// The library never persists this on its own; hand it to a
/// [`CheckpointStore`](crate::store::CheckpointStore) if you need restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Working block, `None` until the first [`Checkpointer::advance_to`].
    pub current_block: Option<u64>,
    /// Transaction IDs processed per tracked block.
    pub processed_transactions: BTreeMap<u64, HashSet<String>>,
    /// Keep the sets of earlier blocks when advancing.
    pub retain_history: bool,
}

/// Tracks the last block acknowledged by a stream consumer and the transactions
/// processed within it.
///
/// Not thread-safe on purpose: callbacks sharing one instance serialize access themselves.
#[derive(Debug, Clone, Default)]
pub struct Checkpointer {
    state: CheckpointState,
}

impl Checkpointer {
    /// New empty checkpointer. With `retain_history = false` only the current
    /// block's set is kept.
    pub fn new(retain_history: bool) -> Self {
        Self {
            state: CheckpointState {
                retain_history,
                ..CheckpointState::default()
            },
        }
    }

    /// Rebuild from a previously saved snapshot.
    pub fn from_state(mut state: CheckpointState) -> Self {
        if let Some(block) = state.current_block {
            state.processed_transactions.entry(block).or_default();
        }
        Self { state }
    }

    /// Snapshot for persistence.
    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    /// Whether earlier blocks' sets survive [`advance_to`](Self::advance_to).
    pub fn retains_history(&self) -> bool {
        self.state.retain_history
    }

    /// Mark `transaction_id` as processed in the current block.
    /// Without a current block there is nothing to checkpoint against and the call does nothing.
    pub fn record_transaction(&mut self, transaction_id: impl Into<String>) {
        if let Some(block) = self.state.current_block {
            self.state
                .processed_transactions
                .entry(block)
                .or_default()
                .insert(transaction_id.into());
        }
    }

    /// Current block number, if one was ever set.
    pub fn current_block(&self) -> Option<u64> {
        self.state.current_block
    }

    /// Transactions processed in `block`, or in the current block when `None`.
    /// Unknown blocks yield an empty set.
    pub fn processed_transactions(&self, block: Option<u64>) -> HashSet<String> {
        block
            .or(self.state.current_block)
            .and_then(|b| self.state.processed_transactions.get(&b))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `transaction_id` was already handled in the current block.
    pub fn is_processed(&self, transaction_id: &str) -> bool {
        self.state
            .current_block
            .and_then(|b| self.state.processed_transactions.get(&b))
            .is_some_and(|set| set.contains(transaction_id))
    }

    /// Move the working position to `block`.
    ///
    /// Advancing to the current block again keeps its recorded transactions.
    pub fn advance_to(&mut self, block: u64) {
        if self.state.current_block == Some(block) {
            self.state.processed_transactions.entry(block).or_default();
            return;
        }

        if !self.state.retain_history {
            if let Some(previous) = self.state.current_block {
                self.state.processed_transactions.remove(&previous);
            }
        }

        self.state.current_block = Some(block);
        // A retained set for a block we come back to starts over.
        self.state.processed_transactions.insert(block, HashSet::new());
    }
}
