//! Fixtures shared by this crate's tests and downstream test suites.

use std::collections::BTreeMap;
use std::sync::Arc;

use ln_01_block_storage::InMemoryKVStore;
use parking_lot::RwLock;
use shared_crypto::generate_key_pair;
use shared_types::{AccountNumber, KeyPair, Node, NodeDeclaration};

use crate::domain::{AlphaAccount, Block, SignedChangeRequest, SignedChangeRequestMessage};
use crate::ports::LedgerReader;
use crate::service::LedgerService;

pub const TREASURY_BALANCE: u64 = 1_000_000;

pub fn in_memory_ledger() -> LedgerService<InMemoryKVStore> {
    LedgerService::with_store_lock(Arc::new(RwLock::new(InMemoryKVStore::new())))
}

pub fn make_node(identifier: &AccountNumber, port: u16) -> Node {
    Node {
        identifier: identifier.clone(),
        addresses: vec![format!("http://127.0.0.1:{port}/")],
        fee: 4,
    }
}

/// Genesis request signed by the primary validator, funding `treasury`.
pub fn make_genesis_request(
    primary_validator: &KeyPair,
    treasury: &AccountNumber,
) -> SignedChangeRequest {
    let mut accounts = BTreeMap::new();
    accounts.insert(
        treasury.clone(),
        AlphaAccount {
            balance: TREASURY_BALANCE,
            balance_lock: treasury.clone().into(),
        },
    );
    let message =
        SignedChangeRequestMessage::genesis(primary_validator.public.clone().into(), accounts);
    SignedChangeRequest::create(message, &primary_validator.private)
        .expect("fixture keys are valid")
}

/// Node declaration signed by `pair` using its current ledger lock.
pub fn make_node_declaration<L: LedgerReader>(
    ledger: &L,
    pair: &KeyPair,
    port: u16,
) -> SignedChangeRequest {
    let lock = ledger.current_lock(&pair.public).expect("ledger readable");
    let node = NodeDeclaration {
        addresses: vec![format!("http://127.0.0.1:{port}/")],
        fee: 4,
    };
    let message = SignedChangeRequestMessage::node_declaration(lock, node);
    SignedChangeRequest::create(message, &pair.private).expect("fixture keys are valid")
}

/// A genesis-seeded ledger and the keys that built it.
pub struct GenesisFixture {
    pub ledger: LedgerService<InMemoryKVStore>,
    pub primary_validator: KeyPair,
    pub primary_validator_node: Node,
    pub treasury: KeyPair,
    pub genesis: Block,
}

impl GenesisFixture {
    pub fn new() -> Self {
        Self::on(in_memory_ledger())
    }

    /// Seed `ledger` with a fresh genesis block.
    pub fn on(ledger: LedgerService<InMemoryKVStore>) -> Self {
        let primary_validator = generate_key_pair();
        let treasury = generate_key_pair();
        Self::with_keys(ledger, primary_validator, treasury)
    }

    pub fn with_keys(
        ledger: LedgerService<InMemoryKVStore>,
        primary_validator: KeyPair,
        treasury: KeyPair,
    ) -> Self {
        let primary_validator_node = make_node(&primary_validator.public, 8555);
        let request = make_genesis_request(&primary_validator, &treasury.public);
        let genesis = ledger
            .add_genesis_block(&request, &primary_validator_node, &primary_validator.private)
            .expect("genesis applies to an empty ledger");
        Self {
            ledger,
            primary_validator,
            primary_validator_node,
            treasury,
            genesis,
        }
    }

    /// Append a node declaration by a fresh key pair, signed by the primary validator.
    pub fn declare_node(&self, port: u16) -> (KeyPair, Block) {
        let pair = generate_key_pair();
        let request = make_node_declaration(&self.ledger, &pair, port);
        let block = self
            .ledger
            .add_block_from_signed_change_request(&request, &self.primary_validator.private, true)
            .expect("declaration applies");
        (pair, block)
    }
}

impl Default for GenesisFixture {
    fn default() -> Self {
        Self::new()
    }
}
