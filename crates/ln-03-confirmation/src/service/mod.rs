//! # Confirmation Service
//!
//! Stages blocks from the primary validator, records confirmations and
//! appends a block once enough distinct authorized signers agree on it.
//! Validation and signing of staged blocks happen on [`ConfirmationWorker`].

use std::sync::Arc;

use ln_01_block_storage::{
    get_json, keys, put_json, scan_json, BatchOperation, Collection, KVStoreError, KeyValueStore,
};
use ln_02_ledger::{
    Block, LedgerError, LedgerReader, LedgerService, SequenceError, Validatable,
};
use shared_crypto::derive_public_key;
use shared_types::{AccountNumber, Hash, SigningKey};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::{BlockConfirmation, ConfirmationConfig, ConfirmationError, PendingBlock};
use crate::ports::ConfirmationBroadcaster;

mod worker;
#[cfg(test)]
mod tests;

pub use worker::ConfirmationWorker;

/// A `(number, hash)` candidate queued for the worker.
pub(crate) type Candidate = (u64, Hash);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Staged,
    /// The same `(number, hash)` was staged before.
    AlreadyStaged,
    /// The block number is already part of the chain.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Stored; `accepted` is set when this confirmation completed the quorum.
    Recorded { accepted: bool },
    /// The block number is already part of the chain.
    Stale,
}

pub struct ConfirmationService<S: KeyValueStore> {
    ledger: LedgerService<S>,
    broadcaster: Arc<dyn ConfirmationBroadcaster>,
    signing_key: SigningKey,
    identity: AccountNumber,
    config: ConfirmationConfig,
    notify: mpsc::UnboundedSender<Candidate>,
}

impl<S: KeyValueStore + 'static> ConfirmationService<S> {
    /// Build the service and the worker that processes staged blocks.
    /// The worker does nothing until it is run.
    pub fn new(
        ledger: LedgerService<S>,
        broadcaster: Arc<dyn ConfirmationBroadcaster>,
        signing_key: SigningKey,
        config: ConfirmationConfig,
    ) -> Result<(Arc<Self>, ConfirmationWorker<S>), ConfirmationError> {
        let identity = derive_public_key(&signing_key)?;
        let (notify, receiver) = mpsc::unbounded_channel();
        let service = Arc::new(Self {
            ledger,
            broadcaster,
            signing_key,
            identity,
            config,
            notify,
        });
        let worker = ConfirmationWorker::new(service.clone(), receiver);
        Ok((service, worker))
    }
}

impl<S: KeyValueStore> ConfirmationService<S> {
    pub fn identity(&self) -> &AccountNumber {
        &self.identity
    }

    pub fn config(&self) -> &ConfirmationConfig {
        &self.config
    }

    pub fn ledger(&self) -> &LedgerService<S> {
        &self.ledger
    }

    // === READS ===

    pub fn pending_block(
        &self,
        number: u64,
        hash: &Hash,
    ) -> Result<Option<PendingBlock>, ConfirmationError> {
        let store = self.ledger.store();
        let pending = get_json(&*store.read(), &keys::pending_block(number, hash.as_str()))?;
        Ok(pending)
    }

    /// Every staged block, lowest number first.
    pub fn pending_blocks(&self) -> Result<Vec<PendingBlock>, ConfirmationError> {
        let store = self.ledger.store();
        let entries: Vec<(Vec<u8>, PendingBlock)> =
            scan_json(&*store.read(), &Collection::PendingBlock.prefix())?;
        Ok(entries.into_iter().map(|(_, pending)| pending).collect())
    }

    /// Recorded confirmations for one candidate, one per signer.
    pub fn confirmations(
        &self,
        number: u64,
        hash: &Hash,
    ) -> Result<Vec<BlockConfirmation>, ConfirmationError> {
        let store = self.ledger.store();
        let entries: Vec<(Vec<u8>, BlockConfirmation)> = scan_json(
            &*store.read(),
            &keys::block_confirmations_for_hash(number, hash.as_str()),
        )?;
        Ok(entries.into_iter().map(|(_, confirmation)| confirmation).collect())
    }

    // === STAGING ===

    /// Store `block` as pending and queue it for the worker. Returns without
    /// waiting for validation.
    pub fn stage_block(&self, block: Block) -> Result<StageOutcome, ConfirmationError> {
        block.validate_structure()?;
        let pending = PendingBlock::new(block)?;
        if pending.number < self.ledger.next_block_number()? {
            debug!("[ln-03] Ignoring stale block {}", pending.number);
            return Ok(StageOutcome::Stale);
        }

        let key = keys::pending_block(pending.number, pending.hash.as_str());
        let body = serde_json::to_vec(&pending).map_err(KVStoreError::corruption)?;
        let store = self.ledger.store();
        if !store.write().insert_if_absent(&key, &body)? {
            return Ok(StageOutcome::AlreadyStaged);
        }

        info!("[ln-03] Staged block {} ({})", pending.number, pending.hash);
        self.enqueue(pending.number, pending.hash);
        Ok(StageOutcome::Staged)
    }

    fn enqueue(&self, number: u64, hash: Hash) {
        if self.notify.send((number, hash)).is_err() {
            warn!("[ln-03] Confirmation worker stopped, block {} stays staged", number);
        }
    }

    // === CONFIRMING ===

    /// Validate a staged block, sign it, record and broadcast the
    /// confirmation, then check for quorum.
    ///
    /// Returns `None` when the candidate is gone or waits for earlier blocks.
    pub async fn confirm(
        &self,
        number: u64,
        hash: &Hash,
    ) -> Result<Option<BlockConfirmation>, ConfirmationError> {
        let Some(pending) = self.pending_block(number, hash)? else {
            debug!("[ln-03] Block {} ({}) is no longer pending", number, hash);
            return Ok(None);
        };

        let next = self.ledger.next_block_number()?;
        if number < next {
            self.prune_through(number)?;
            return Ok(None);
        }
        if number > next {
            debug!("[ln-03] Block {} waits for block {}", number, next);
            return Ok(None);
        }

        if let Err(err) = pending.block.validate(&self.ledger) {
            warn!("[ln-03] Not confirming block {} ({}): {}", number, hash, err);
            self.discard(number, hash)?;
            return Err(err.into());
        }

        let confirmation = BlockConfirmation::create(number, hash.clone(), &self.signing_key)?;
        // A conflicting vote is already logged by `record`; ours still counts.
        self.record(&confirmation)?;
        let delivered = self.broadcaster.broadcast_confirmation(&confirmation).await;
        debug!(
            "[ln-03] Confirmation for block {} delivered to {} peers",
            number, delivered
        );

        self.try_accept(number, hash)?;
        Ok(Some(confirmation))
    }

    /// Handle a confirmation sent by another confirmation validator.
    pub fn receive_confirmation(
        &self,
        confirmation: &BlockConfirmation,
    ) -> Result<ReceiveOutcome, ConfirmationError> {
        if !confirmation.is_signature_valid() {
            return Err(ConfirmationError::InvalidSignature);
        }
        if confirmation.number < self.ledger.next_block_number()? {
            return Ok(ReceiveOutcome::Stale);
        }

        let conflict = self.record(confirmation)?;
        let accepted = self
            .try_accept(confirmation.number, &confirmation.hash)?
            .is_some();
        match conflict {
            Some(existing) if !accepted => Err(ConfirmationError::Fork {
                number: confirmation.number,
                existing,
                conflicting: confirmation.hash.clone(),
            }),
            _ => Ok(ReceiveOutcome::Recorded { accepted }),
        }
    }

    fn check_authorized(&self, signer: &AccountNumber) -> Result<(), ConfirmationError> {
        let authorized = if self.config.confirmation_validators.is_empty() {
            self.ledger.node_by_identifier(signer)?.is_some()
        } else {
            self.config.confirmation_validators.contains(signer)
        };
        if !authorized {
            return Err(ConfirmationError::UnauthorizedSigner(signer.clone()));
        }
        Ok(())
    }

    /// Verify and store one confirmation under `(number, hash, signer)`.
    ///
    /// Every hash keeps its own tally, so an early vote for another hash at
    /// the same number never blocks the quorum of this one. Returns the hash
    /// already confirmed by someone else at that number, if it differs.
    fn record(
        &self,
        confirmation: &BlockConfirmation,
    ) -> Result<Option<Hash>, ConfirmationError> {
        if !confirmation.is_signature_valid() {
            return Err(ConfirmationError::InvalidSignature);
        }
        self.check_authorized(&confirmation.signer)?;

        let store = self.ledger.store();
        let mut store = store.write();
        let existing: Vec<(Vec<u8>, BlockConfirmation)> =
            scan_json(&*store, &keys::block_confirmations_for(confirmation.number))?;
        let conflict = existing
            .into_iter()
            .map(|(_, other)| other)
            .find(|other| other.hash != confirmation.hash);
        if let Some(other) = &conflict {
            warn!(
                "[ln-03] Fork at block {}: {} confirmed {}, {} confirmed {}",
                confirmation.number,
                other.signer,
                other.hash,
                confirmation.signer,
                confirmation.hash
            );
        }

        let key = keys::block_confirmation(
            confirmation.number,
            confirmation.hash.as_str(),
            confirmation.signer.as_str(),
        );
        store.atomic_batch_write(vec![put_json(key, confirmation)?])?;
        Ok(conflict.map(|other| other.hash))
    }

    // === ACCEPTANCE ===

    /// Append the candidate when it has a quorum, is the next block and its
    /// body is staged. Returns the appended block.
    pub fn try_accept(&self, number: u64, hash: &Hash) -> Result<Option<Block>, ConfirmationError> {
        let signers = self.confirmations(number, hash)?.len();
        if signers < self.config.quorum {
            return Ok(None);
        }
        if number != self.ledger.next_block_number()? {
            return Ok(None);
        }
        let Some(pending) = self.pending_block(number, hash)? else {
            debug!("[ln-03] Quorum for block {} reached before the block arrived", number);
            return Ok(None);
        };

        match self.ledger.append_locked(&pending.block, true) {
            Ok(()) => {}
            Err(LedgerError::LockContention(_)) => {
                debug!("[ln-03] Block lock busy, block {} not appended yet", number);
                return Ok(None);
            }
            Err(LedgerError::Sequence(SequenceError::OutOfOrder { expected, actual }))
                if actual < expected =>
            {
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            "[ln-03] Accepted block {} ({}) with {} confirmations",
            number, hash, signers
        );
        self.prune_through(number)?;
        for pending in self.pending_blocks()? {
            if pending.number == number + 1 {
                self.enqueue(pending.number, pending.hash);
            }
        }
        Ok(Some(pending.block))
    }

    // === PRUNING ===

    fn discard(&self, number: u64, hash: &Hash) -> Result<(), ConfirmationError> {
        let store = self.ledger.store();
        store
            .write()
            .delete(&keys::pending_block(number, hash.as_str()))?;
        Ok(())
    }

    /// Drop pending blocks and confirmations for `number` and below.
    fn prune_through(&self, number: u64) -> Result<(), ConfirmationError> {
        let store = self.ledger.store();
        let mut store = store.write();
        let mut operations = Vec::new();
        for collection in [Collection::PendingBlock, Collection::BlockConfirmation] {
            for (key, _) in store.prefix_scan(&collection.prefix())? {
                if keys::parse_number(&key, 0).is_some_and(|n| n <= number) {
                    operations.push(BatchOperation::delete(key));
                }
            }
        }
        let pruned = operations.len();
        store.atomic_batch_write(operations)?;
        debug!("[ln-03] Pruned {} entries through block {}", pruned, number);
        Ok(())
    }
}
