use std::sync::Arc;
use std::time::Duration;

use ln_01_block_storage::InMemoryKVStore;
use ln_02_ledger::domain::block::now;
use ln_02_ledger::test_utils::{make_node_declaration, GenesisFixture};
use ln_02_ledger::{
    compute_update, Block, BlockMessage, BlockRef, LedgerError, LedgerReader,
    SignedChangeRequest, SignedChangeRequestMessage,
};
use shared_crypto::{generate_key_pair, hash_bytes};
use shared_types::{Hash, KeyPair, NodeDeclaration, Type};
use tokio::sync::watch;

use super::*;
use crate::adapters::RecordingBroadcaster;

struct Network {
    fixture: GenesisFixture,
    local: KeyPair,
    remote: KeyPair,
    third: KeyPair,
    broadcaster: Arc<RecordingBroadcaster>,
    service: Arc<ConfirmationService<InMemoryKVStore>>,
    worker: ConfirmationWorker<InMemoryKVStore>,
}

impl Network {
    fn with_config(config: ConfirmationConfig) -> Self {
        let fixture = GenesisFixture::new();
        let (local, _) = fixture.declare_node(8601);
        let (remote, _) = fixture.declare_node(8602);
        let (third, _) = fixture.declare_node(8603);
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        let (service, worker) = ConfirmationService::new(
            fixture.ledger.clone(),
            broadcaster.clone(),
            local.private.clone(),
            config,
        )
        .unwrap();
        Self {
            fixture,
            local,
            remote,
            third,
            broadcaster,
            service,
            worker,
        }
    }

    fn new(quorum: usize) -> Self {
        Self::with_config(ConfirmationConfig::with_quorum(quorum))
    }

    fn next_number(&self) -> u64 {
        self.fixture.ledger.next_block_number().unwrap()
    }

    /// Next block from the primary validator, not yet appended.
    fn next_block(&self) -> (Block, Hash) {
        let pair = generate_key_pair();
        let request = make_node_declaration(&self.fixture.ledger, &pair, 9000);
        let message =
            BlockMessage::create_from_signed_change_request(&request, &self.fixture.ledger)
                .unwrap();
        let block = Block::create(message, &self.fixture.primary_validator.private).unwrap();
        let hash = block.make_hash().unwrap();
        (block, hash)
    }

    /// Block chained onto `previous`, which need not be appended.
    fn block_after(&self, previous: &Block) -> (Block, Hash) {
        let pair = generate_key_pair();
        let node = NodeDeclaration {
            addresses: vec!["http://127.0.0.1:9001/".into()],
            fee: 4,
        };
        let request = SignedChangeRequest::create(
            SignedChangeRequestMessage::node_declaration(pair.public.clone().into(), node),
            &pair.private,
        )
        .unwrap();
        let message = BlockMessage {
            block_type: Type::NodeDeclaration,
            number: previous.number() + 1,
            identifier: Some(previous.message.make_hash().unwrap().into()),
            timestamp: now(),
            update: compute_update(&request).unwrap(),
            request,
        };
        let block = Block::create(message, &self.fixture.primary_validator.private).unwrap();
        let hash = block.make_hash().unwrap();
        (block, hash)
    }
}

// =============================================================================
// STAGING
// =============================================================================

#[test]
fn test_stage_block_is_idempotent() {
    let network = Network::new(2);
    let (block, hash) = network.next_block();

    assert_eq!(
        network.service.stage_block(block.clone()).unwrap(),
        StageOutcome::Staged
    );
    assert_eq!(
        network.service.stage_block(block).unwrap(),
        StageOutcome::AlreadyStaged
    );

    let pending = network.service.pending_blocks().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].hash, hash);
}

#[test]
fn test_stage_stale_block_is_ignored() {
    let network = Network::new(1);
    let genesis = network.fixture.genesis.clone();
    assert_eq!(
        network.service.stage_block(genesis).unwrap(),
        StageOutcome::Stale
    );
    assert!(network.service.pending_blocks().unwrap().is_empty());
}

#[test]
fn test_stage_malformed_block_is_structural() {
    let network = Network::new(1);
    let (mut block, _) = network.next_block();
    block.message.number = 0;

    let err = network.service.stage_block(block).unwrap_err();
    assert!(matches!(err, ConfirmationError::Structural(_)));
}

// =============================================================================
// QUORUM
// =============================================================================

#[tokio::test]
async fn test_quorum_of_two_appends_exactly_once() {
    let network = Network::new(2);
    let number = network.next_number();
    let (block, hash) = network.next_block();
    network.service.stage_block(block.clone()).unwrap();

    let local = network.service.confirm(number, &hash).await.unwrap().unwrap();
    assert_eq!(local.signer, network.local.public);
    assert_eq!(network.broadcaster.sent(), vec![local]);
    assert_eq!(network.next_number(), number);

    let remote = BlockConfirmation::create(number, hash.clone(), &network.remote.private).unwrap();
    assert_eq!(
        network.service.receive_confirmation(&remote).unwrap(),
        ReceiveOutcome::Recorded { accepted: true }
    );
    assert_eq!(network.next_number(), number + 1);
    assert_eq!(
        network.fixture.ledger.get_block(BlockRef::Number(number)).unwrap(),
        Some(block)
    );

    // Late and replayed confirmations change nothing.
    let third = BlockConfirmation::create(number, hash.clone(), &network.third.private).unwrap();
    assert_eq!(
        network.service.receive_confirmation(&third).unwrap(),
        ReceiveOutcome::Stale
    );
    assert_eq!(
        network.service.receive_confirmation(&remote).unwrap(),
        ReceiveOutcome::Stale
    );
    assert!(network.service.try_accept(number, &hash).unwrap().is_none());
    assert_eq!(network.next_number(), number + 1);

    assert!(network.service.pending_blocks().unwrap().is_empty());
    assert!(network.service.confirmations(number, &hash).unwrap().is_empty());
}

#[test]
fn test_repeated_signer_counts_once() {
    let network = Network::new(2);
    let number = network.next_number();
    let (block, hash) = network.next_block();
    network.service.stage_block(block).unwrap();

    let remote = BlockConfirmation::create(number, hash.clone(), &network.remote.private).unwrap();
    for _ in 0..3 {
        assert_eq!(
            network.service.receive_confirmation(&remote).unwrap(),
            ReceiveOutcome::Recorded { accepted: false }
        );
    }
    assert_eq!(network.service.confirmations(number, &hash).unwrap().len(), 1);
    assert_eq!(network.next_number(), number);
}

#[tokio::test]
async fn test_confirmations_before_block_arrives() {
    let network = Network::new(2);
    let number = network.next_number();
    let (block, hash) = network.next_block();

    let remote = BlockConfirmation::create(number, hash.clone(), &network.remote.private).unwrap();
    let third = BlockConfirmation::create(number, hash.clone(), &network.third.private).unwrap();
    network.service.receive_confirmation(&remote).unwrap();
    // Quorum reached, but the body is not staged yet.
    assert_eq!(
        network.service.receive_confirmation(&third).unwrap(),
        ReceiveOutcome::Recorded { accepted: false }
    );
    assert_eq!(network.next_number(), number);

    network.service.stage_block(block).unwrap();
    network.service.confirm(number, &hash).await.unwrap();
    assert_eq!(network.next_number(), number + 1);
}

#[tokio::test]
async fn test_quorum_of_one_accepts_own_confirmation() {
    let network = Network::new(1);
    let number = network.next_number();
    let (block, hash) = network.next_block();
    network.service.stage_block(block).unwrap();

    network.service.confirm(number, &hash).await.unwrap();
    assert_eq!(network.next_number(), number + 1);
}

#[tokio::test]
async fn test_later_block_waits_for_predecessor() {
    let mut network = Network::new(1);
    let number = network.next_number();
    let (first, first_hash) = network.next_block();
    let (second, second_hash) = network.block_after(&first);

    network.service.stage_block(second).unwrap();
    assert!(network
        .service
        .confirm(number + 1, &second_hash)
        .await
        .unwrap()
        .is_none());
    assert_eq!(network.next_number(), number);

    network.service.stage_block(first).unwrap();
    network.service.confirm(number, &first_hash).await.unwrap();
    assert_eq!(network.next_number(), number + 1);

    // Acceptance re-queues the staged successor.
    let mut queued = Vec::new();
    while let Ok(candidate) = network.worker.receiver.try_recv() {
        queued.push(candidate);
    }
    assert_eq!(queued.last(), Some(&(number + 1, second_hash.clone())));

    network.service.confirm(number + 1, &second_hash).await.unwrap();
    assert_eq!(network.next_number(), number + 2);
}

// =============================================================================
// REJECTIONS
// =============================================================================

#[test]
fn test_conflicting_hash_is_fork() {
    let network = Network::new(3);
    let number = network.next_number();
    let (_, hash) = network.next_block();
    let (_, other_hash) = network.next_block();
    assert_ne!(hash, other_hash);

    let remote = BlockConfirmation::create(number, hash.clone(), &network.remote.private).unwrap();
    network.service.receive_confirmation(&remote).unwrap();

    let conflicting =
        BlockConfirmation::create(number, other_hash.clone(), &network.third.private).unwrap();
    let err = network.service.receive_confirmation(&conflicting).unwrap_err();
    match err {
        ConfirmationError::Fork {
            number: fork_number,
            existing,
            conflicting,
        } => {
            assert_eq!(fork_number, number);
            assert_eq!(existing, hash);
            assert_eq!(conflicting, other_hash);
        }
        other => panic!("expected fork, got {other:?}"),
    }
    // Both tallies are kept.
    assert_eq!(network.service.confirmations(number, &hash).unwrap().len(), 1);
    assert_eq!(
        network.service.confirmations(number, &other_hash).unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_early_conflicting_vote_does_not_block_quorum() {
    let network = Network::new(2);
    let number = network.next_number();
    let bogus: Hash = hash_bytes(b"never staged");
    let early = BlockConfirmation::create(number, bogus.clone(), &network.third.private).unwrap();
    assert_eq!(
        network.service.receive_confirmation(&early).unwrap(),
        ReceiveOutcome::Recorded { accepted: false }
    );

    let (block, hash) = network.next_block();
    network.service.stage_block(block.clone()).unwrap();
    let local = network.service.confirm(number, &hash).await.unwrap();
    assert!(local.is_some());
    assert_eq!(network.service.confirmations(number, &hash).unwrap().len(), 1);

    let remote = BlockConfirmation::create(number, hash.clone(), &network.remote.private).unwrap();
    assert_eq!(
        network.service.receive_confirmation(&remote).unwrap(),
        ReceiveOutcome::Recorded { accepted: true }
    );
    assert_eq!(network.next_number(), number + 1);
    assert_eq!(
        network.fixture.ledger.get_block(BlockRef::Number(number)).unwrap(),
        Some(block)
    );
    assert!(network.service.confirmations(number, &bogus).unwrap().is_empty());
}

#[test]
fn test_unregistered_signer_rejected() {
    let network = Network::new(1);
    let number = network.next_number();
    let (_, hash) = network.next_block();
    let stranger = generate_key_pair();

    let confirmation = BlockConfirmation::create(number, hash.clone(), &stranger.private).unwrap();
    let err = network.service.receive_confirmation(&confirmation).unwrap_err();
    assert!(matches!(err, ConfirmationError::UnauthorizedSigner(signer) if signer == stranger.public));
    assert!(network.service.confirmations(number, &hash).unwrap().is_empty());
}

#[test]
fn test_configured_validators_restrict_signers() {
    let network = Network::with_config(ConfirmationConfig {
        quorum: 1,
        confirmation_validators: vec![generate_key_pair().public],
    });
    let number = network.next_number();
    let (_, hash) = network.next_block();

    // Registered in the node registry, but not a configured validator.
    let remote = BlockConfirmation::create(number, hash, &network.remote.private).unwrap();
    let err = network.service.receive_confirmation(&remote).unwrap_err();
    assert!(matches!(err, ConfirmationError::UnauthorizedSigner(_)));
}

#[test]
fn test_forged_confirmation_rejected() {
    let network = Network::new(1);
    let number = network.next_number();
    let (_, hash) = network.next_block();

    let mut confirmation =
        BlockConfirmation::create(number, hash, &network.remote.private).unwrap();
    confirmation.number += 1;
    let err = network.service.receive_confirmation(&confirmation).unwrap_err();
    assert!(matches!(err, ConfirmationError::InvalidSignature));
}

#[tokio::test]
async fn test_invalid_block_is_not_confirmed() {
    let network = Network::new(1);
    let number = network.next_number();
    let pair = generate_key_pair();
    let request = make_node_declaration(&network.fixture.ledger, &pair, 9000);
    let message =
        BlockMessage::create_from_signed_change_request(&request, &network.fixture.ledger)
            .unwrap();
    // Signed by a node that is not scheduled.
    let block = Block::create(message, &network.remote.private).unwrap();
    let hash = block.make_hash().unwrap();
    network.service.stage_block(block).unwrap();

    let err = network.service.confirm(number, &hash).await.unwrap_err();
    assert!(matches!(
        err,
        ConfirmationError::Ledger(LedgerError::UnauthorizedSigner { .. })
    ));
    assert!(network.broadcaster.sent().is_empty());
    assert!(network.service.pending_block(number, &hash).unwrap().is_none());
    assert_eq!(network.next_number(), number);
}

// =============================================================================
// WORKER
// =============================================================================

#[tokio::test]
async fn test_worker_confirms_staged_blocks() {
    let network = Network::new(1);
    let number = network.next_number();
    let (block, _) = network.next_block();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = network.worker.spawn(shutdown_rx);

    network.service.stage_block(block).unwrap();

    let ledger = network.fixture.ledger.clone();
    tokio::time::timeout(Duration::from_secs(5), async move {
        while ledger.next_block_number().unwrap() == number {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(network.broadcaster.sent().len(), 1);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_worker_stops_on_shutdown() {
    let network = Network::new(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = network.worker.spawn(shutdown_rx);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
