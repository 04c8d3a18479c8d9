//! # Integration Test Flows
//!
//! ## Flows Tested
//!
//! 1. **Genesis → declarations**: the primary validator seeds the chain and
//!    appends node declarations
//! 2. **Forwarding → confirmation**: a request sent to a confirmation
//!    validator reaches the primary validator, its block is confirmed by a
//!    quorum and appended everywhere
//! 3. **Sync**: a fresh node replays the chain from a peer
//! 4. **Failure isolation**: an offline validator stalls the quorum but not
//!    the primary validator

use std::time::Duration;

use ln_02_ledger::test_utils::make_node_declaration;
use ln_02_ledger::{BlockRef, LedgerReader};
use ln_04_peer_sync::{NodeClient, PeerSyncError};
use node_runtime::genesis::{create_genesis, read_source, GenesisError, GenesisOptions};
use node_runtime::{LedgerNode, NodeConfig};
use shared_crypto::generate_key_pair;

use super::network::{
    address, wait_for_next_block, TestNetwork, FIRST_VALIDATOR_PORT, PRIMARY_VALIDATOR_PORT,
    TREASURY_BALANCE,
};

const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// GENESIS AND DECLARATIONS
// =============================================================================

#[tokio::test]
async fn test_bootstrap_declares_validators() {
    let network = TestNetwork::new(2, 2);
    let primary = network.bootstrap().await;
    let ledger = primary.ledger();

    assert_eq!(ledger.next_block_number().unwrap(), 3);
    assert_eq!(
        ledger.current_balance(&network.treasury.public).unwrap(),
        TREASURY_BALANCE
    );
    assert_eq!(
        ledger.primary_validator().unwrap().unwrap().identifier,
        network.primary_validator.public
    );
    for (index, pair) in network.confirmation_validators.iter().enumerate() {
        let node = ledger.node_by_identifier(&pair.public).unwrap().unwrap();
        assert_eq!(
            node.addresses,
            vec![address(TestNetwork::validator_port(index))]
        );
    }
}

#[tokio::test]
async fn test_genesis_persists_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let pair = generate_key_pair();
    let config = NodeConfig {
        signing_key: Some(pair.private.clone()),
        data_dir: dir.path().to_path_buf(),
        ..NodeConfig::default()
    };

    let root_file = dir.path().join("alpha.json");
    std::fs::write(
        &root_file,
        format!(
            r#"{{"{account}": {{"balance": 1000, "balance_lock": "{account}"}}}}"#,
            account = pair.public
        ),
    )
    .unwrap();
    let accounts = read_source(root_file.to_str().unwrap(), Duration::from_secs(1))
        .await
        .unwrap();

    {
        let node = LedgerNode::open(config.clone()).unwrap();
        create_genesis(node.ledger(), node.config(), accounts.clone(), &GenesisOptions::default())
            .unwrap();
    }

    let node = LedgerNode::open(config).unwrap();
    assert_eq!(node.ledger().last_block_number().unwrap(), Some(0));
    assert_eq!(node.ledger().current_balance(&pair.public).unwrap(), 1000);

    let err = create_genesis(node.ledger(), node.config(), accounts, &GenesisOptions::default())
        .unwrap_err();
    assert!(matches!(err, GenesisError::AlreadyExists));
}

// =============================================================================
// FORWARDING AND CONFIRMATION
// =============================================================================

#[tokio::test]
async fn test_forwarded_request_is_confirmed_by_quorum() {
    let network = TestNetwork::new(2, 2);
    let primary = network.bootstrap().await;
    let first = network.start_validator(0).await;
    let second = network.start_validator(1).await;
    assert_eq!(first.ledger().next_block_number().unwrap(), 3);

    // A client talks to a confirmation validator, not the primary validator.
    let client_pair = generate_key_pair();
    let request = make_node_declaration(first.ledger(), &client_pair, 8700);
    network
        .client
        .send_signed_change_request(&address(FIRST_VALIDATOR_PORT), &request)
        .await
        .unwrap();

    assert_eq!(primary.ledger().next_block_number().unwrap(), 4);
    assert!(wait_for_next_block(&first, 4, WAIT).await);
    assert!(wait_for_next_block(&second, 4, WAIT).await);

    let head = primary.ledger().get_block_raw(BlockRef::Last).unwrap();
    assert_eq!(first.ledger().get_block_raw(BlockRef::Last).unwrap(), head);
    assert_eq!(second.ledger().get_block_raw(BlockRef::Last).unwrap(), head);
    assert!(first
        .ledger()
        .node_by_identifier(&client_pair.public)
        .unwrap()
        .is_some());

    // Accepted blocks leave nothing pending.
    let service = first.confirmation().unwrap();
    assert!(service.pending_blocks().unwrap().is_empty());

    first.shutdown().await;
    second.shutdown().await;
}

#[tokio::test]
async fn test_consecutive_blocks_are_confirmed_in_order() {
    let network = TestNetwork::new(2, 2);
    let primary = network.bootstrap().await;
    let first = network.start_validator(0).await;
    let second = network.start_validator(1).await;

    for port in 8700..8703 {
        let pair = generate_key_pair();
        let request = make_node_declaration(primary.ledger(), &pair, port);
        network
            .client
            .send_signed_change_request(&address(PRIMARY_VALIDATOR_PORT), &request)
            .await
            .unwrap();
    }

    assert_eq!(primary.ledger().next_block_number().unwrap(), 6);
    assert!(wait_for_next_block(&first, 6, WAIT).await);
    assert!(wait_for_next_block(&second, 6, WAIT).await);

    first.shutdown().await;
    second.shutdown().await;
}

#[tokio::test]
async fn test_offline_validator_stalls_quorum() {
    let network = TestNetwork::new(2, 2);
    let primary = network.bootstrap().await;
    let first = network.start_validator(0).await;

    let pair = generate_key_pair();
    let request = make_node_declaration(primary.ledger(), &pair, 8700);
    network
        .client
        .send_signed_change_request(&address(PRIMARY_VALIDATOR_PORT), &request)
        .await
        .unwrap();

    // The primary validator appends regardless; one confirmation is not enough.
    assert_eq!(primary.ledger().next_block_number().unwrap(), 4);
    assert!(!wait_for_next_block(&first, 4, Duration::from_millis(200)).await);
    let service = first.confirmation().unwrap();
    assert_eq!(service.pending_blocks().unwrap().len(), 1);

    // Catching up through sync unblocks the stalled validator.
    let report = first.sync().await.unwrap();
    assert_eq!(report.next_block_number, 4);
    assert_eq!(first.ledger().next_block_number().unwrap(), 4);

    first.shutdown().await;
}

#[tokio::test]
async fn test_request_fails_when_primary_validator_is_offline() {
    let network = TestNetwork::new(1, 1);
    let primary = network.bootstrap().await;
    let validator = network.start_validator(0).await;
    network.take_offline(&primary);

    let pair = generate_key_pair();
    let request = make_node_declaration(validator.ledger(), &pair, 8700);
    let err = network
        .client
        .send_signed_change_request(&address(FIRST_VALIDATOR_PORT), &request)
        .await
        .unwrap_err();

    assert!(matches!(err, PeerSyncError::Status { status: 503, .. }));
    assert_eq!(validator.ledger().next_block_number().unwrap(), 2);

    validator.shutdown().await;
}

// =============================================================================
// SYNC
// =============================================================================

#[tokio::test]
async fn test_fresh_node_syncs_from_validator() {
    let network = TestNetwork::new(1, 1);
    let primary = network.bootstrap().await;
    let validator = network.start_validator(0).await;

    let observer_pair = generate_key_pair();
    let request = make_node_declaration(primary.ledger(), &observer_pair, 8700);
    network
        .client
        .send_signed_change_request(&address(PRIMARY_VALIDATOR_PORT), &request)
        .await
        .unwrap();
    assert!(wait_for_next_block(&validator, 3, WAIT).await);

    let observer = network.node(&observer_pair, 8700);
    assert!(observer.confirmation().is_none());
    let report = observer
        .peers()
        .sync_with_address(&address(FIRST_VALIDATOR_PORT))
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.applied, 3);

    // Now that it knows the registry, a network sync is a no-op.
    let report = observer.sync().await.unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(
        observer.ledger().get_block_raw(BlockRef::Last).unwrap(),
        primary.ledger().get_block_raw(BlockRef::Last).unwrap()
    );

    validator.shutdown().await;
}

#[tokio::test]
async fn test_node_without_peers_cannot_sync() {
    let network = TestNetwork::new(1, 1);
    let node = network.node(&generate_key_pair(), 8700);
    let err = node.sync().await.unwrap_err();
    assert!(matches!(err, PeerSyncError::NoPeerSynced));
}
