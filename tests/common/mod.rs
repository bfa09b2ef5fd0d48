//! In-memory ledger for integration tests: records every call and matches
//! listener removal by callback identity, like a real SDK does.
#![allow(dead_code)]

use async_trait::async_trait;
use fabric_listener::events::same_listener;
use fabric_listener::prelude::*;
use fabric_listener::{BlockListener, BlockListenerOptions, ContractListener, ListenerOptions};
use fabric_listener::{Contract, Network, Session};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One call seen by the fake ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Connect,
    Disconnect,
    AddContract {
        channel: String,
        contract: String,
        start_block: Option<u64>,
    },
    RemoveContract {
        channel: String,
        contract: String,
    },
    AddBlock {
        channel: String,
        start_block: Option<u64>,
        kind: BlockEventKind,
    },
    RemoveBlock {
        channel: String,
    },
}

impl Op {
    pub fn is_add(&self) -> bool {
        matches!(self, Op::AddContract { .. } | Op::AddBlock { .. })
    }
    pub fn is_remove(&self) -> bool {
        matches!(self, Op::RemoveContract { .. } | Op::RemoveBlock { .. })
    }
}

/// Shared state behind every handle the fake connector hands out.
#[derive(Default)]
pub struct MockLedger {
    pub ops: Mutex<Vec<Op>>,
    pub connects: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub fail_add: AtomicBool,
    pub fail_remove: AtomicBool,
    /// Removals of listeners that were not attached.
    pub stray_removals: AtomicUsize,
    contract_listeners: Mutex<Vec<(String, String, ContractListener)>>,
    block_listeners: Mutex<Vec<(String, BlockListener)>>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Listeners currently attached on the network side.
    pub fn attached(&self) -> usize {
        self.contract_listeners.lock().unwrap().len() + self.block_listeners.lock().unwrap().len()
    }

    pub fn stray_removals(&self) -> usize {
        self.stray_removals.load(Ordering::SeqCst)
    }

    /// How many times `listener` is attached on `channel`.
    pub fn contract_listener_count(&self, channel: &str, listener: &ContractListener) -> usize {
        self.contract_listeners
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _, l)| c == channel && same_listener(l, listener))
            .count()
    }

    pub fn is_block_listener_attached(&self, channel: &str, listener: &BlockListener) -> bool {
        self.block_listeners
            .lock()
            .unwrap()
            .iter()
            .any(|(c, l)| c == channel && same_listener(l, listener))
    }

    /// Deliver a block to every block listener of `channel`.
    pub async fn emit_block(&self, channel: &str, event: BlockEvent) -> anyhow::Result<()> {
        let targets: Vec<BlockListener> = self
            .block_listeners
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, l)| l.clone())
            .collect();
        for l in targets {
            l.on_block(event.clone()).await?;
        }
        Ok(())
    }

    /// Deliver a contract event to every listener of that contract on `channel`.
    pub async fn emit_contract(&self, channel: &str, event: ContractEvent) -> anyhow::Result<()> {
        let targets: Vec<ContractListener> = self
            .contract_listeners
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, n, _)| c == channel && *n == event.contract)
            .map(|(_, _, l)| l.clone())
            .collect();
        for l in targets {
            l.on_event(event.clone()).await?;
        }
        Ok(())
    }

    fn removal_refused(&self) -> bool {
        self.fail_remove.load(Ordering::SeqCst)
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }
}

pub struct MockConnector {
    pub ledger: Arc<MockLedger>,
}

#[async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(&self, options: &GatewayOptions) -> anyhow::Result<MockSession> {
        self.ledger.connects.fetch_add(1, Ordering::SeqCst);
        if self.ledger.fail_connect.load(Ordering::SeqCst) {
            anyhow::bail!("no peers reachable for {}", options.identity);
        }
        self.ledger.record(Op::Connect);
        Ok(MockSession {
            ledger: self.ledger.clone(),
        })
    }
}

pub struct MockSession {
    ledger: Arc<MockLedger>,
}

#[async_trait]
impl Session for MockSession {
    type Network = MockNetwork;

    async fn network(&self, channel: &str) -> anyhow::Result<MockNetwork> {
        Ok(MockNetwork {
            channel: channel.to_string(),
            ledger: self.ledger.clone(),
        })
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        self.ledger.record(Op::Disconnect);
        Ok(())
    }
}

pub struct MockNetwork {
    channel: String,
    ledger: Arc<MockLedger>,
}

#[async_trait]
impl Network for MockNetwork {
    type Contract = MockContract;

    fn contract(&self, name: &str) -> MockContract {
        MockContract {
            channel: self.channel.clone(),
            name: name.to_string(),
            ledger: self.ledger.clone(),
        }
    }

    async fn add_block_listener(
        &self,
        listener: &BlockListener,
        options: BlockListenerOptions,
    ) -> anyhow::Result<()> {
        if self.ledger.fail_add.load(Ordering::SeqCst) {
            anyhow::bail!("event service refused listener");
        }
        self.ledger.record(Op::AddBlock {
            channel: self.channel.clone(),
            start_block: options.start_block,
            kind: options.kind,
        });
        self.ledger
            .block_listeners
            .lock()
            .unwrap()
            .push((self.channel.clone(), listener.clone()));
        Ok(())
    }

    async fn remove_block_listener(&self, listener: &BlockListener) -> anyhow::Result<()> {
        self.ledger.record(Op::RemoveBlock {
            channel: self.channel.clone(),
        });
        if self.ledger.removal_refused() {
            anyhow::bail!("event service unavailable");
        }
        let mut attached = self.ledger.block_listeners.lock().unwrap();
        match attached
            .iter()
            .position(|(c, l)| *c == self.channel && same_listener(l, listener))
        {
            Some(pos) => {
                attached.remove(pos);
            }
            None => {
                self.ledger.stray_removals.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

pub struct MockContract {
    channel: String,
    name: String,
    ledger: Arc<MockLedger>,
}

#[async_trait]
impl Contract for MockContract {
    async fn add_contract_listener(
        &self,
        listener: &ContractListener,
        options: ListenerOptions,
    ) -> anyhow::Result<()> {
        if self.ledger.fail_add.load(Ordering::SeqCst) {
            anyhow::bail!("event service refused listener");
        }
        self.ledger.record(Op::AddContract {
            channel: self.channel.clone(),
            contract: self.name.clone(),
            start_block: options.start_block,
        });
        self.ledger.contract_listeners.lock().unwrap().push((
            self.channel.clone(),
            self.name.clone(),
            listener.clone(),
        ));
        Ok(())
    }

    async fn remove_contract_listener(&self, listener: &ContractListener) -> anyhow::Result<()> {
        self.ledger.record(Op::RemoveContract {
            channel: self.channel.clone(),
            contract: self.name.clone(),
        });
        if self.ledger.removal_refused() {
            anyhow::bail!("event service unavailable");
        }
        let mut attached = self.ledger.contract_listeners.lock().unwrap();
        match attached
            .iter()
            .position(|(c, n, l)| *c == self.channel && *n == self.name && same_listener(l, listener))
        {
            Some(pos) => {
                attached.remove(pos);
            }
            None => {
                self.ledger.stray_removals.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

/// Callback that remembers what it saw.
#[derive(Default)]
pub struct Recorder {
    pub blocks: Mutex<Vec<u64>>,
    pub events: Mutex<Vec<String>>,
}

#[async_trait]
impl BlockEventHandler for Recorder {
    async fn on_block(&self, event: BlockEvent) -> anyhow::Result<()> {
        self.blocks.lock().unwrap().push(event.block_number);
        Ok(())
    }
}

#[async_trait]
impl ContractEventHandler for Recorder {
    async fn on_event(&self, event: ContractEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.event_name);
        Ok(())
    }
}

/// Route library logs to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn client(ledger: &Arc<MockLedger>) -> EventClient<MockConnector> {
    init_tracing();
    EventClient::new(
        MockConnector {
            ledger: ledger.clone(),
        },
        GatewayOptions::new("appUser").with_localhost(true),
    )
}
