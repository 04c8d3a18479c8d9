//! # Multi-Node Harness
//!
//! Nodes share one [`LoopbackNodeClient`]; a node is reachable once it is
//! served and unreachable after it is taken offline.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ln_01_block_storage::InMemoryKVStore;
use ln_02_ledger::test_utils::{in_memory_ledger, make_node_declaration};
use ln_02_ledger::{AlphaAccount, LedgerReader};
use ln_04_peer_sync::NodeClient;
use node_runtime::adapters::LoopbackNodeClient;
use node_runtime::genesis::{create_genesis, GenesisOptions};
use node_runtime::{LedgerNode, NodeConfig};
use shared_crypto::generate_key_pair;
use shared_types::KeyPair;

pub const PRIMARY_VALIDATOR_PORT: u16 = 8555;
pub const FIRST_VALIDATOR_PORT: u16 = 8601;
pub const TREASURY_BALANCE: u64 = 1_000_000;

pub type MemoryNode = LedgerNode<InMemoryKVStore>;

pub fn address(port: u16) -> String {
    format!("http://127.0.0.1:{port}/")
}

pub struct TestNetwork {
    pub client: Arc<LoopbackNodeClient>,
    pub primary_validator: KeyPair,
    pub confirmation_validators: Vec<KeyPair>,
    pub treasury: KeyPair,
    pub quorum: usize,
}

impl TestNetwork {
    pub fn new(validator_count: usize, quorum: usize) -> Self {
        Self {
            client: Arc::new(LoopbackNodeClient::new()),
            primary_validator: generate_key_pair(),
            confirmation_validators: (0..validator_count).map(|_| generate_key_pair()).collect(),
            treasury: generate_key_pair(),
            quorum,
        }
    }

    pub fn validator_port(index: usize) -> u16 {
        FIRST_VALIDATOR_PORT + index as u16
    }

    pub fn config(&self, key: &KeyPair, port: u16) -> NodeConfig {
        NodeConfig {
            signing_key: Some(key.private.clone()),
            node_addresses: vec![address(port)],
            quorum: self.quorum,
            confirmation_validators: self
                .confirmation_validators
                .iter()
                .map(|pair| pair.public.clone())
                .collect(),
            ..NodeConfig::default()
        }
    }

    /// Node over an empty in-memory ledger. Not yet served.
    pub fn node(&self, key: &KeyPair, port: u16) -> Arc<MemoryNode> {
        let node = LedgerNode::new(self.config(key, port), in_memory_ledger(), self.client.clone())
            .expect("test configuration is complete");
        Arc::new(node)
    }

    pub fn serve(&self, node: &MemoryNode) {
        for address in &node.config().node_addresses {
            self.client.register(address.clone(), node.handler());
        }
    }

    pub fn take_offline(&self, node: &MemoryNode) {
        for address in &node.config().node_addresses {
            self.client.unregister(address);
        }
    }

    /// Primary validator with genesis applied and every confirmation
    /// validator declared, served at its address.
    pub async fn bootstrap(&self) -> Arc<MemoryNode> {
        let primary = self.node(&self.primary_validator, PRIMARY_VALIDATOR_PORT);
        let mut accounts = BTreeMap::new();
        accounts.insert(
            self.treasury.public.clone(),
            AlphaAccount {
                balance: TREASURY_BALANCE,
                balance_lock: self.treasury.public.clone().into(),
            },
        );
        create_genesis(
            primary.ledger(),
            primary.config(),
            accounts,
            &GenesisOptions::default(),
        )
        .expect("genesis applies to an empty ledger");
        self.serve(&primary);

        for (index, pair) in self.confirmation_validators.iter().enumerate() {
            let request =
                make_node_declaration(primary.ledger(), pair, Self::validator_port(index));
            self.client
                .send_signed_change_request(&address(PRIMARY_VALIDATOR_PORT), &request)
                .await
                .expect("primary validator accepts the declaration");
        }
        primary
    }

    /// Confirmation validator `index`, synced from the primary validator,
    /// served and running.
    pub async fn start_validator(&self, index: usize) -> Arc<MemoryNode> {
        let node = self.node(
            &self.confirmation_validators[index],
            Self::validator_port(index),
        );
        let report = node
            .peers()
            .sync_with_address(&address(PRIMARY_VALIDATOR_PORT))
            .await
            .expect("primary validator is reachable");
        assert!(report.is_complete(), "bootstrap sync failed: {:?}", report.error);
        self.serve(&node);
        node.start();
        node
    }
}

/// Poll until `node` expects block `number` next.
pub async fn wait_for_next_block(node: &MemoryNode, number: u64, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if node.ledger().next_block_number().ok() == Some(number) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
