//! Listener bookkeeping: channel → stream → registrations.
//!
//! The registry only records what is attached. Anything touching the network
//! goes through a [`ListenerBinder`], which keeps this module ledger-agnostic.
use crate::{
    error::{ClientError, Result},
    events::{same_listener, BlockEventKind, BlockListener, ContractListener},
};
use async_trait::async_trait;
use std::{collections::BTreeMap, fmt};

/// Identity of an event stream inside a channel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamKey {
    /// Events of one contract.
    Contract(String),
    /// Block events of the whole channel.
    Blocks,
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKey::Contract(name) => write!(f, "contract `{name}`"),
            StreamKey::Blocks => f.write_str("blocks"),
        }
    }
}

/// One attached listener.
#[derive(Clone)]
pub enum Registration {
    /// Contract event listener.
    Contract {
        /// Contract name, also the stream key.
        contract: String,
        /// Callback; removal on the network layer matches this exact `Arc`.
        listener: ContractListener,
        /// First block requested.
        start_block: Option<u64>,
    },
    /// Block event listener.
    Block {
        /// Callback; removal on the network layer matches this exact `Arc`.
        listener: BlockListener,
        /// Full or private blocks.
        kind: BlockEventKind,
        /// First block requested.
        start_block: Option<u64>,
    },
}

impl Registration {
    /// Stream this registration belongs to.
    pub fn stream_key(&self) -> StreamKey {
        match self {
            Registration::Contract { contract, .. } => StreamKey::Contract(contract.clone()),
            Registration::Block { .. } => StreamKey::Blocks,
        }
    }

    /// Requested first block.
    pub fn start_block(&self) -> Option<u64> {
        match self {
            Registration::Contract { start_block, .. } | Registration::Block { start_block, .. } => {
                *start_block
            }
        }
    }

    /// Block content kind (block listeners only).
    pub fn kind(&self) -> Option<BlockEventKind> {
        match self {
            Registration::Contract { .. } => None,
            Registration::Block { kind, .. } => Some(*kind),
        }
    }

    /// Whether both registrations carry the same callback.
    pub fn same_listener(&self, other: &Registration) -> bool {
        match (self, other) {
            (
                Registration::Contract { listener: a, .. },
                Registration::Contract { listener: b, .. },
            ) => same_listener(a, b),
            (Registration::Block { listener: a, .. }, Registration::Block { listener: b, .. }) => {
                same_listener(a, b)
            }
            _ => false,
        }
    }

    /// Copy with a new start block, and a new block kind when given.
    pub fn rebased(&self, start: Option<u64>, new_kind: Option<BlockEventKind>) -> Registration {
        let mut next = self.clone();
        match &mut next {
            Registration::Contract { start_block, .. } => *start_block = start,
            Registration::Block {
                start_block, kind, ..
            } => {
                *start_block = start;
                if let Some(k) = new_kind {
                    *kind = k;
                }
            }
        }
        next
    }

    /// Read-only view of this registration.
    pub fn info(&self) -> RegistrationInfo {
        RegistrationInfo {
            stream: self.stream_key(),
            start_block: self.start_block(),
            kind: self.kind(),
        }
    }

    pub(crate) fn add_operation(&self) -> &'static str {
        match self {
            Registration::Contract { .. } => "add_contract_listener",
            Registration::Block { .. } => "add_block_listener",
        }
    }

    pub(crate) fn remove_operation(&self) -> &'static str {
        match self {
            Registration::Contract { .. } => "remove_contract_listener",
            Registration::Block { .. } => "remove_block_listener",
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("stream", &self.stream_key())
            .field("start_block", &self.start_block())
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// Snapshot of a registration without the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationInfo {
    /// Stream key.
    pub stream: StreamKey,
    /// Requested first block.
    pub start_block: Option<u64>,
    /// Block kind for block streams.
    pub kind: Option<BlockEventKind>,
}

/// Network-layer side of a registration.
#[async_trait]
pub trait ListenerBinder: Send + Sync {
    /// Attach `registration` on `channel`.
    async fn bind(&self, channel: &str, registration: &Registration) -> anyhow::Result<()>;
    /// Detach `registration` from `channel`. Detaching a registration that is
    /// not attached succeeds; an error means it may still be attached.
    async fn unbind(&self, channel: &str, registration: &Registration) -> anyhow::Result<()>;
}

type Streams = BTreeMap<StreamKey, Vec<Registration>>;

/// Per-channel, per-stream registrations, plus registrations parked by a pausing disconnect.
#[derive(Debug, Default)]
pub struct EventRegistry {
    active: BTreeMap<String, Streams>,
    paused: BTreeMap<String, Streams>,
}

impl EventRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attached listener under its channel and stream.
    ///
    /// # Errors
    /// [`ClientError::DuplicateListener`] if the same callback is already on that stream.
    pub fn add(&mut self, channel: &str, registration: Registration) -> Result<()> {
        if self.contains(channel, &registration) {
            return Err(ClientError::DuplicateListener {
                channel: channel.to_string(),
                stream: registration.stream_key(),
            });
        }
        insert(&mut self.active, channel, registration);
        Ok(())
    }

    /// Whether the callback of `registration` is active on its stream.
    pub fn contains(&self, channel: &str, registration: &Registration) -> bool {
        self.active
            .get(channel)
            .and_then(|streams| streams.get(&registration.stream_key()))
            .is_some_and(|regs| regs.iter().any(|r| r.same_listener(registration)))
    }

    /// Whether `(channel, stream)` has at least one active registration.
    pub fn has_stream(&self, channel: &str, stream: &StreamKey) -> bool {
        self.active
            .get(channel)
            .is_some_and(|streams| streams.contains_key(stream))
    }

    /// Remove every active registration of `channel`, or of all channels when `None`.
    /// Returns `(channel, registration)` pairs; empty when there was nothing to remove.
    pub fn remove_all(&mut self, channel: Option<&str>) -> Vec<(String, Registration)> {
        let channels: Vec<String> = match channel {
            Some(c) => vec![c.to_string()],
            None => self.active.keys().cloned().collect(),
        };

        let mut removed = Vec::new();
        for c in channels {
            if let Some(streams) = self.active.remove(&c) {
                removed.extend(
                    streams
                        .into_values()
                        .flatten()
                        .map(|reg| (c.clone(), reg)),
                );
            }
        }
        removed
    }

    /// Park registrations of `channel` so they can be resumed later.
    pub fn pause(&mut self, channel: &str, registrations: impl IntoIterator<Item = Registration>) {
        for reg in registrations {
            insert(&mut self.paused, channel, reg);
        }
    }

    /// Take the parked registrations of `channel`.
    pub fn take_paused(&mut self, channel: &str) -> Vec<Registration> {
        self.paused
            .remove(channel)
            .map(|streams| streams.into_values().flatten().collect())
            .unwrap_or_default()
    }

    /// Forget parked registrations of `channel`, or of all channels when `None`.
    pub fn discard_paused(&mut self, channel: Option<&str>) -> usize {
        match channel {
            Some(c) => self
                .paused
                .remove(c)
                .map_or(0, |streams| streams.values().map(Vec::len).sum()),
            None => {
                let n: usize = self.paused.values().flat_map(|s| s.values()).map(Vec::len).sum();
                self.paused.clear();
                n
            }
        }
    }

    /// Re-attach every listener of `(channel, stream)` from `start_block`, keeping
    /// each callback. Block streams also switch to `kind` when given.
    ///
    /// Each listener is unbound, then bound again with the new options, then
    /// updated in place. A stream without registrations is left alone and
    /// yields `Ok(0)`.
    ///
    /// # Errors
    /// The first unbind or bind failure. A listener that cannot be unbound is
    /// left untouched. One that cannot be bound again is rebound with its old
    /// options; if that fails too it is dropped from the registry. The rest of
    /// the stream is still replayed.
    pub async fn replay<B>(
        &mut self,
        channel: &str,
        stream: &StreamKey,
        start_block: Option<u64>,
        kind: Option<BlockEventKind>,
        binder: &B,
    ) -> Result<usize>
    where
        B: ListenerBinder + ?Sized,
    {
        let Some(regs) = self
            .active
            .get_mut(channel)
            .and_then(|streams| streams.get_mut(stream))
        else {
            tracing::debug!(channel, %stream, "nothing to replay");
            return Ok(0);
        };

        let mut replayed = 0;
        let mut first_err = None;
        let mut i = 0;
        while i < regs.len() {
            let old = regs[i].clone();

            // Possibly still attached: never bind the same callback twice.
            if let Err(e) = binder.unbind(channel, &old).await {
                let err = ClientError::network(channel, old.remove_operation(), e);
                tracing::warn!(error = %err, "listener left on its old start block");
                first_err.get_or_insert(err);
                i += 1;
                continue;
            }

            let next = old.rebased(start_block, kind);
            match binder.bind(channel, &next).await {
                Ok(()) => {
                    regs[i] = next;
                    replayed += 1;
                    i += 1;
                }
                Err(e) => {
                    let err = ClientError::network(channel, next.add_operation(), e);
                    match binder.bind(channel, &old).await {
                        Ok(()) => i += 1,
                        Err(restore) => {
                            tracing::warn!(
                                channel,
                                %stream,
                                error = %restore,
                                "could not restore listener, dropping it"
                            );
                            regs.remove(i);
                        }
                    }
                    first_err.get_or_insert(err);
                }
            }
        }

        tracing::debug!(channel, %stream, ?start_block, replayed, "replayed listeners");
        prune(&mut self.active, channel, stream);

        match first_err {
            Some(err) => Err(err),
            None => Ok(replayed),
        }
    }

    /// Channels with active registrations.
    pub fn channels(&self) -> Vec<String> {
        self.active.keys().cloned().collect()
    }

    /// Channels with parked registrations.
    pub fn paused_channels(&self) -> Vec<String> {
        self.paused.keys().cloned().collect()
    }

    /// Active registrations of `channel`, ordered by stream then insertion.
    pub fn snapshot(&self, channel: &str) -> Vec<RegistrationInfo> {
        self.active
            .get(channel)
            .map(|streams| streams.values().flatten().map(Registration::info).collect())
            .unwrap_or_default()
    }

    /// Number of active registrations.
    pub fn len(&self) -> usize {
        self.active
            .values()
            .flat_map(|streams| streams.values())
            .map(Vec::len)
            .sum()
    }

    /// No active registrations.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

fn insert(map: &mut BTreeMap<String, Streams>, channel: &str, registration: Registration) {
    map.entry(channel.to_string())
        .or_default()
        .entry(registration.stream_key())
        .or_default()
        .push(registration);
}

// Drop empty buckets so `channels()`/`is_empty()` stay exact.
fn prune(map: &mut BTreeMap<String, Streams>, channel: &str, stream: &StreamKey) {
    if let Some(streams) = map.get_mut(channel) {
        if streams.get(stream).is_some_and(Vec::is_empty) {
            streams.remove(stream);
        }
        if streams.is_empty() {
            map.remove(channel);
        }
    }
}
