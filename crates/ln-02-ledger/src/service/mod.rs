//! # Ledger Service
//!
//! Owns the account, node, schedule and block projections. Reads take a
//! store read guard and never touch the block lock. The only mutation is
//! [`LedgerService::append`], which requires the block lock to be held and
//! commits one block in a single batch.

use std::str::FromStr;
use std::sync::Arc;

use ln_01_block_storage::{
    get_json, keys, put_json, scan_json, AdvisoryLock, BatchOperation, Collection, KVStoreError,
    KeyValueStore, NamedLock, StoreLock,
};
use parking_lot::RwLock;
use shared_types::{
    AccountLock, AccountNumber, AccountState, BlockIdentifier, Node, Page, Pagination, Schedule,
    SigningKey, ValidationError,
};
use tracing::{info, warn};

use crate::domain::{
    Block, BlockMessage, LedgerError, LedgerResult, SequenceError, SignedChangeRequest,
};
use crate::ports::LedgerReader;


/// Block selector for retrieval: a number or the latest block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRef {
    Number(u64),
    Last,
}

impl FromStr for BlockRef {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == "last" {
            return Ok(BlockRef::Last);
        }
        value
            .parse()
            .map(BlockRef::Number)
            .map_err(|_| ValidationError::field("block_number", "Must be a number or 'last'."))
    }
}

// =============================================================================
// STORE READS
// =============================================================================

fn last_block_number<S: KeyValueStore>(store: &S) -> LedgerResult<Option<u64>> {
    Ok(get_json(store, &keys::last_block_number())?)
}

fn next_block_number<S: KeyValueStore>(store: &S) -> LedgerResult<u64> {
    Ok(last_block_number(store)?.map_or(0, |last| last + 1))
}

/// Hash of the last block message, `None` on an empty chain.
fn next_block_identifier<S: KeyValueStore>(store: &S) -> LedgerResult<Option<BlockIdentifier>> {
    let Some(last) = last_block_number(store)? else {
        return Ok(None);
    };
    let block: Option<Block> = get_json(store, &keys::block(last))?;
    match block {
        Some(block) => Ok(Some(block.message.make_hash()?.into())),
        None => Err(KVStoreError::corruption(format!("head block {last} is missing")).into()),
    }
}

fn account_state<S: KeyValueStore>(
    store: &S,
    account: &AccountNumber,
) -> LedgerResult<Option<AccountState>> {
    Ok(get_json(store, &keys::account(account.as_str()))?)
}

fn resolve<S: KeyValueStore>(store: &S, block: BlockRef) -> LedgerResult<Option<u64>> {
    match block {
        BlockRef::Number(number) => Ok(Some(number)),
        BlockRef::Last => last_block_number(store),
    }
}

// =============================================================================
// LEDGER SERVICE
// =============================================================================

/// The ledger state engine over an injected keyed store.
pub struct LedgerService<S: KeyValueStore> {
    store: Arc<RwLock<S>>,
    lock: NamedLock,
}

impl<S: KeyValueStore> Clone for LedgerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            lock: self.lock.clone(),
        }
    }
}

impl<S: KeyValueStore + 'static> LedgerService<S> {
    /// Ledger whose block lock lives in the same store.
    pub fn with_store_lock(store: Arc<RwLock<S>>) -> Self {
        let backend: Arc<dyn AdvisoryLock> = Arc::new(StoreLock::new(store.clone()));
        Self::new(store, backend)
    }
}

impl<S: KeyValueStore> LedgerService<S> {
    pub fn new(store: Arc<RwLock<S>>, lock_backend: Arc<dyn AdvisoryLock>) -> Self {
        Self {
            store,
            lock: NamedLock::block(lock_backend),
        }
    }

    /// Shared store handle, for collections this service does not own.
    pub fn store(&self) -> Arc<RwLock<S>> {
        self.store.clone()
    }

    /// The `"block"` lock guarding appends.
    pub fn lock(&self) -> &NamedLock {
        &self.lock
    }

    // === READS ===

    pub fn account_state(&self, account: &AccountNumber) -> LedgerResult<Option<AccountState>> {
        account_state(&*self.store.read(), account)
    }

    pub fn last_block_number(&self) -> LedgerResult<Option<u64>> {
        last_block_number(&*self.store.read())
    }

    pub fn get_block_raw(&self, block: BlockRef) -> LedgerResult<Option<Vec<u8>>> {
        let store = self.store.read();
        match resolve(&*store, block)? {
            Some(number) => Ok(store.get(&keys::block(number))?),
            None => Ok(None),
        }
    }

    pub fn get_block(&self, block: BlockRef) -> LedgerResult<Option<Block>> {
        let store = self.store.read();
        match resolve(&*store, block)? {
            Some(number) => Ok(get_json(&*store, &keys::block(number))?),
            None => Ok(None),
        }
    }

    /// Stored block bodies with `min <= number <= max`, paginated.
    pub fn list_blocks_raw(
        &self,
        min: Option<u64>,
        max: Option<u64>,
        pagination: Pagination,
    ) -> LedgerResult<Page<Vec<u8>>> {
        let entries = self
            .store
            .read()
            .prefix_scan(&Collection::Block.prefix())?;
        let in_range: Vec<Vec<u8>> = entries
            .into_iter()
            .filter(|(key, _)| match keys::parse_number(key, 0) {
                Some(number) => {
                    min.map_or(true, |min| number >= min) && max.map_or(true, |max| number <= max)
                }
                None => false,
            })
            .map(|(_, body)| body)
            .collect();

        Ok(Page {
            count: in_range.len(),
            results: in_range
                .into_iter()
                .skip(pagination.offset)
                .take(pagination.limit)
                .collect(),
        })
    }

    pub fn list_blocks(
        &self,
        min: Option<u64>,
        max: Option<u64>,
        pagination: Pagination,
    ) -> LedgerResult<Page<Block>> {
        let raw = self.list_blocks_raw(min, max, pagination)?;
        let results = raw
            .results
            .iter()
            .map(|body| Block::from_slice(body))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                LedgerError::Storage(ln_01_block_storage::KVStoreError::corruption(err))
            })?;
        Ok(Page {
            count: raw.count,
            results,
        })
    }

    pub fn list_nodes(&self, pagination: Pagination) -> LedgerResult<Page<Node>> {
        let nodes: Vec<(Vec<u8>, Node)> =
            scan_json(&*self.store.read(), &Collection::Node.prefix())?;
        Ok(Page {
            count: nodes.len(),
            results: nodes
                .into_iter()
                .skip(pagination.offset)
                .take(pagination.limit)
                .map(|(_, node)| node)
                .collect(),
        })
    }

    pub fn schedule(&self) -> LedgerResult<Schedule> {
        let entries: Vec<(Vec<u8>, AccountNumber)> =
            scan_json(&*self.store.read(), &Collection::Schedule.prefix())?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, identifier)| {
                keys::parse_number(&key, 0).map(|number| (number, identifier))
            })
            .collect())
    }

    // === WRITES ===

    /// Append `block`. The block lock must already be held.
    ///
    /// The block number and identifier are always checked against the chain
    /// head; the rest of validation runs only when `validate` is set.
    pub fn append(&self, block: &Block, validate: bool) -> LedgerResult<()> {
        self.lock.expect_locked()?;

        if validate {
            if let Err(err) = block.validate(self) {
                warn!("[ln-02] Rejected block {}: {}", block.number(), err);
                return Err(err);
            }
        }

        let mut store = self.store.write();
        let expected = next_block_number(&*store)?;
        if block.number() != expected {
            warn!(
                "[ln-02] Rejected block {}: expected number {}",
                block.number(),
                expected
            );
            return Err(SequenceError::OutOfOrder {
                expected,
                actual: block.number(),
            }
            .into());
        }
        if block.message.identifier != next_block_identifier(&*store)? {
            warn!(
                "[ln-02] Rejected block {}: identifier does not chain to the head",
                block.number()
            );
            return Err(SequenceError::IdentifierMismatch {
                number: block.number(),
            }
            .into());
        }

        let operations = Self::block_operations(&*store, block)?;
        store.atomic_batch_write(operations)?;
        drop(store);

        info!(
            "[ln-02] Appended block {} ({}) signed by {}",
            block.number(),
            block.message.block_type,
            block.signer
        );
        Ok(())
    }

    /// Acquire the block lock, append, release.
    pub fn append_locked(&self, block: &Block, validate: bool) -> LedgerResult<()> {
        let guard = self.lock.acquire()?;
        self.append(block, validate)?;
        guard.release()?;
        Ok(())
    }

    /// Sign `message` and append it. Takes the block lock.
    pub fn add_block_from_block_message(
        &self,
        message: BlockMessage,
        signing_key: &SigningKey,
        validate: bool,
    ) -> LedgerResult<Block> {
        let guard = self.lock.acquire()?;
        let block = Block::create(message, signing_key)?;
        self.append(&block, validate)?;
        guard.release()?;
        Ok(block)
    }

    /// Validate `request`, build the next block from it, sign and append.
    /// Takes the block lock.
    pub fn add_block_from_signed_change_request(
        &self,
        request: &SignedChangeRequest,
        signing_key: &SigningKey,
        validate: bool,
    ) -> LedgerResult<Block> {
        let guard = self.lock.acquire()?;
        if validate {
            request.validate(self)?;
        }
        let message = BlockMessage::create_from_signed_change_request(request, self)?;
        let block = Block::create(message, signing_key)?;
        self.append(&block, false)?;
        guard.release()?;
        Ok(block)
    }

    /// Build, sign and append block 0. Takes the block lock.
    pub fn add_genesis_block(
        &self,
        request: &SignedChangeRequest,
        primary_validator: &Node,
        signing_key: &SigningKey,
    ) -> LedgerResult<Block> {
        let guard = self.lock.acquire()?;
        let message = BlockMessage::create_genesis(request, primary_validator)?;
        let block = Block::create(message, signing_key)?;
        self.append(&block, true)?;
        guard.release()?;
        info!(
            "[ln-02] Genesis block created, primary validator {}",
            primary_validator.identifier
        );
        Ok(block)
    }

    /// Discard every projection, block, pending block and confirmation.
    /// Operator action for forced re-genesis; the block lock must be held.
    pub fn clear(&self) -> LedgerResult<()> {
        self.lock.expect_locked()?;

        let mut store = self.store.write();
        let mut operations = Vec::new();
        for collection in Collection::ALL {
            if collection == Collection::Lock {
                continue;
            }
            for (key, _) in store.prefix_scan(&collection.prefix())? {
                operations.push(BatchOperation::delete(key));
            }
        }
        let deleted = operations.len();
        store.atomic_batch_write(operations)?;
        drop(store);

        warn!("[ln-02] Ledger cleared ({} keys removed)", deleted);
        Ok(())
    }

    /// Every write of one block, in one batch.
    fn block_operations(store: &S, block: &Block) -> LedgerResult<Vec<BatchOperation>> {
        let update = &block.message.update;
        let mut operations = Vec::new();

        for (account, delta) in &update.accounts {
            let mut state = account_state(store, account)?.unwrap_or_default();
            state.apply(delta);
            operations.push(put_json(keys::account(account.as_str()), &state)?);
            if let Some(node) = &delta.node {
                operations.push(put_json(keys::node(account.as_str()), node)?);
            }
        }

        if let Some(schedule) = &update.schedule {
            for (number, identifier) in schedule {
                operations.push(put_json(keys::schedule(*number), identifier)?);
            }
        }

        operations.push(put_json(keys::block(block.number()), block)?);
        operations.push(put_json(keys::last_block_number(), &block.number())?);
        Ok(operations)
    }
}

impl<S: KeyValueStore> LedgerReader for LedgerService<S> {
    fn current_lock(&self, account: &AccountNumber) -> LedgerResult<AccountLock> {
        let lock = self
            .account_state(account)?
            .and_then(|state| state.account_lock);
        Ok(lock.unwrap_or_else(|| account.clone().into()))
    }

    fn current_balance(&self, account: &AccountNumber) -> LedgerResult<u64> {
        Ok(self
            .account_state(account)?
            .and_then(|state| state.balance)
            .unwrap_or(0))
    }

    fn next_block_number(&self) -> LedgerResult<u64> {
        next_block_number(&*self.store.read())
    }

    fn next_block_identifier(&self) -> LedgerResult<Option<BlockIdentifier>> {
        next_block_identifier(&*self.store.read())
    }

    fn node_by_identifier(&self, identifier: &AccountNumber) -> LedgerResult<Option<Node>> {
        Ok(get_json(
            &*self.store.read(),
            &keys::node(identifier.as_str()),
        )?)
    }

    fn validator_for(&self, number: u64) -> LedgerResult<Option<AccountNumber>> {
        Ok(self.schedule()?.range(..=number).next_back().map(|(_, id)| id.clone()))
    }
}
