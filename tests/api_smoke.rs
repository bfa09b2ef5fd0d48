mod common;

use common::{MockConnector, MockLedger, Op, Recorder};
use fabric_listener::prelude::*; // EventClient, Connector, handlers, Checkpointer
use fabric_listener::{BlockListener, ContractListener};
use std::sync::Arc;

#[tokio::test]
async fn client_subscribes_delivers_and_disconnects() -> anyhow::Result<()> {
    let ledger = MockLedger::new();
    let client = EventClient::new(
        MockConnector {
            ledger: ledger.clone(),
        },
        GatewayOptions::from_json_str(r#"{ "identity": "appUser", "as_localhost": true }"#)?,
    );

    // Nothing is opened before the first subscription.
    assert!(!client.is_connected().await);
    assert_eq!(ledger.connects(), 0);

    let recorder = Arc::new(Recorder::default());
    let contract_listener: ContractListener = recorder.clone();
    let block_listener: BlockListener = recorder.clone();

    client
        .subscribe_to_contract_events("retail", "blockmarket", contract_listener, None)
        .await?;
    client
        .subscribe_to_block_events("retail", block_listener, None, BlockEventKind::Full)
        .await?;
    assert_eq!(ledger.connects(), 1, "session is shared by both subscriptions");

    ledger
        .emit_contract(
            "retail",
            ContractEvent {
                contract: "blockmarket".into(),
                event_name: "OfferCreated".into(),
                transaction_id: "tx-1".into(),
                block_number: 4,
                payload: b"{}".to_vec(),
            },
        )
        .await?;
    ledger
        .emit_block(
            "retail",
            BlockEvent {
                block_number: 4,
                kind: BlockEventKind::Full,
                transaction_ids: vec!["tx-1".into()],
                payload: vec![],
            },
        )
        .await?;

    assert_eq!(*recorder.events.lock().unwrap(), vec!["OfferCreated"]);
    assert_eq!(*recorder.blocks.lock().unwrap(), vec![4]);

    client.disconnect_all().await?;
    assert_eq!(ledger.ops().first(), Some(&Op::Connect));
    assert_eq!(ledger.ops().last(), Some(&Op::Disconnect));
    assert_eq!(ledger.attached(), 0);

    Ok(())
}
