//! # Peer Sync Service
//!
//! Listing streams, propagation with address fallback, and chain replay.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use ln_01_block_storage::KeyValueStore;
use ln_02_ledger::{Block, LedgerReader, LedgerService};
use ln_03_confirmation::{BlockConfirmation, ConfirmationBroadcaster};
use shared_types::{AccountNumber, Node, Page, Pagination};
use tracing::{debug, info, warn};

use crate::domain::{Outgoing, PeerSyncError, PropagationReport, SyncReport};
use crate::ports::NodeClient;


// =============================================================================
// LISTING
// =============================================================================

/// Lazy stream over a paginated listing. Stops after the first short page
/// or the first error.
fn paginate<T, F, Fut>(page_size: usize, fetch: F) -> BoxStream<'static, Result<T, PeerSyncError>>
where
    T: Send + 'static,
    F: Fn(Pagination) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Page<T>, PeerSyncError>> + Send + 'static,
{
    let start = Some(Pagination::new(0, page_size.max(1)));
    stream::unfold((fetch, start), |(fetch, window)| async move {
        let pagination = window?;
        match fetch(pagination).await {
            Ok(page) => {
                let following = (!page.is_last(&pagination)).then(|| pagination.next());
                Some((Ok(page.results), (fetch, following)))
            }
            Err(err) => Some((Err(err), (fetch, None))),
        }
    })
    .map_ok(|results| stream::iter(results.into_iter().map(Ok)))
    .try_flatten()
    .boxed()
}

/// Every node registered at `address`.
pub fn list_nodes(
    client: Arc<dyn NodeClient>,
    address: String,
    page_size: usize,
) -> BoxStream<'static, Result<Node, PeerSyncError>> {
    paginate(page_size, move |pagination| {
        let client = client.clone();
        let address = address.clone();
        async move {
            debug!("[ln-04] Fetching nodes {:?} from {}", pagination, address);
            client.list_nodes(&address, pagination).await
        }
    })
}

/// Blocks at `address` numbered `from` through `to` (inclusive, open-ended
/// when `None`), in order.
pub fn list_blocks(
    client: Arc<dyn NodeClient>,
    address: String,
    from: u64,
    to: Option<u64>,
    page_size: usize,
) -> BoxStream<'static, Result<Block, PeerSyncError>> {
    paginate(page_size, move |pagination| {
        let client = client.clone();
        let address = address.clone();
        async move {
            debug!("[ln-04] Fetching blocks {:?} from {}", pagination, address);
            client.list_blocks(&address, Some(from), to, pagination).await
        }
    })
}

// =============================================================================
// PEER SYNC SERVICE
// =============================================================================

pub struct PeerSyncService<S: KeyValueStore> {
    ledger: LedgerService<S>,
    client: Arc<dyn NodeClient>,
    identity: AccountNumber,
    page_size: usize,
    /// Confirmation targets. Empty means every other registered node.
    confirmation_validators: Vec<AccountNumber>,
}

impl<S: KeyValueStore> PeerSyncService<S> {
    pub fn new(
        ledger: LedgerService<S>,
        client: Arc<dyn NodeClient>,
        identity: AccountNumber,
        page_size: usize,
    ) -> Self {
        Self {
            ledger,
            client,
            identity,
            page_size,
            confirmation_validators: Vec::new(),
        }
    }

    pub fn with_confirmation_validators(mut self, validators: Vec<AccountNumber>) -> Self {
        self.confirmation_validators = validators;
        self
    }

    pub fn client(&self) -> Arc<dyn NodeClient> {
        self.client.clone()
    }

    pub fn nodes(&self, address: &str) -> BoxStream<'static, Result<Node, PeerSyncError>> {
        list_nodes(self.client.clone(), address.to_owned(), self.page_size)
    }

    pub fn blocks(
        &self,
        address: &str,
        from: u64,
        to: Option<u64>,
    ) -> BoxStream<'static, Result<Block, PeerSyncError>> {
        list_blocks(self.client.clone(), address.to_owned(), from, to, self.page_size)
    }

    /// Registered nodes other than this one, from the local ledger.
    pub fn known_peers(&self) -> Result<Vec<Node>, PeerSyncError> {
        let mut peers = Vec::new();
        let mut pagination = Pagination::new(0, self.page_size.max(1));
        loop {
            let page = self.ledger.list_nodes(pagination)?;
            let last = page.is_last(&pagination);
            peers.extend(
                page.results
                    .into_iter()
                    .filter(|node| node.identifier != self.identity),
            );
            if last {
                return Ok(peers);
            }
            pagination = pagination.next();
        }
    }

    /// Nodes that should receive blocks and confirmations.
    pub fn confirmation_targets(&self) -> Result<Vec<Node>, PeerSyncError> {
        let peers = self.known_peers()?;
        if self.confirmation_validators.is_empty() {
            return Ok(peers);
        }
        Ok(peers
            .into_iter()
            .filter(|node| self.confirmation_validators.contains(&node.identifier))
            .collect())
    }

    // === PROPAGATION ===

    async fn deliver(&self, address: &str, message: Outgoing<'_>) -> Result<(), PeerSyncError> {
        match message {
            Outgoing::Request(request) => {
                self.client
                    .send_signed_change_request(address, request)
                    .await
            }
            Outgoing::Block(block) => self.client.send_block(address, block).await,
            Outgoing::Confirmation(confirmation) => {
                self.client
                    .send_block_confirmation(address, confirmation)
                    .await
            }
        }
    }

    /// Try each of `node`'s addresses in order. Returns the address that
    /// accepted the message.
    pub async fn send_to_node(
        &self,
        node: &Node,
        message: Outgoing<'_>,
    ) -> Result<String, PeerSyncError> {
        for address in &node.addresses {
            match self.deliver(address, message).await {
                Ok(()) => return Ok(address.clone()),
                Err(err) => warn!(
                    "[ln-04] Failed to send {} to {} at {}: {}",
                    message.kind(),
                    node.identifier,
                    address,
                    err
                ),
            }
        }
        Err(PeerSyncError::Unreachable {
            node: node.identifier.clone(),
        })
    }

    /// Send `message` to every node concurrently. One node failing does not
    /// affect the others.
    pub async fn broadcast(&self, nodes: &[Node], message: Outgoing<'_>) -> PropagationReport {
        let outcomes = join_all(nodes.iter().map(|node| async move {
            (node.identifier.clone(), self.send_to_node(node, message).await)
        }))
        .await;

        let mut report = PropagationReport::default();
        for (identifier, outcome) in outcomes {
            match outcome {
                Ok(address) => report.delivered.push((identifier, address)),
                Err(err) => report.failed.push((identifier, err)),
            }
        }
        debug!(
            "[ln-04] {} delivered to {} of {} nodes",
            message.kind(),
            report.delivered.len(),
            nodes.len()
        );
        report
    }

    pub async fn broadcast_block(&self, block: &Block) -> Result<PropagationReport, PeerSyncError> {
        let targets = self.confirmation_targets()?;
        Ok(self.broadcast(&targets, Outgoing::Block(block)).await)
    }

    // === SYNCHRONIZATION ===

    /// Replay `address`'s chain from the local `next_block_number`. Each
    /// block is validated and appended under the block lock.
    pub async fn sync_with_address(&self, address: &str) -> Result<SyncReport, PeerSyncError> {
        let start = self.ledger.next_block_number()?;
        let mut report = SyncReport {
            address: address.to_owned(),
            applied: 0,
            next_block_number: start,
            error: None,
        };

        let mut blocks = self.blocks(address, start, None);
        while let Some(item) = blocks.next().await {
            let outcome = item.and_then(|block| {
                if block.number() != report.next_block_number {
                    return Err(PeerSyncError::UnexpectedBlock {
                        expected: report.next_block_number,
                        actual: block.number(),
                    });
                }
                self.ledger.append_locked(&block, true)?;
                Ok(())
            });
            if let Err(err) = outcome {
                warn!(
                    "[ln-04] Sync with {} stopped at block {}: {}",
                    address, report.next_block_number, err
                );
                report.error = Some(err);
                break;
            }
            report.applied += 1;
            report.next_block_number += 1;
        }

        if report.applied > 0 {
            info!(
                "[ln-04] Synced {} blocks from {}, next block {}",
                report.applied, address, report.next_block_number
            );
        }
        Ok(report)
    }

    /// Sync with the first of `node`'s addresses that completes a run.
    ///
    /// Transport failures move on to the next address. A block the ledger
    /// refuses ends the attempt with [`PeerSyncError::Rejected`], since every
    /// address serves the same chain. `Unreachable` means no address could
    /// be talked to.
    pub async fn sync_with_node(&self, node: &Node) -> Result<SyncReport, PeerSyncError> {
        for address in &node.addresses {
            let mut report = self.sync_with_address(address).await?;
            match report.error.take() {
                None => return Ok(report),
                Some(err) if err.is_transport() => {}
                Some(err) => {
                    return Err(PeerSyncError::Rejected {
                        node: node.identifier.clone(),
                        number: report.next_block_number,
                        source: Box::new(err),
                    })
                }
            }
        }
        Err(PeerSyncError::Unreachable {
            node: node.identifier.clone(),
        })
    }

    /// Sync with registered peers until one run completes. When none does,
    /// the last rejected block is reported over plain unreachability.
    pub async fn sync_with_network(&self) -> Result<SyncReport, PeerSyncError> {
        let mut rejected = None;
        for node in self.known_peers()? {
            match self.sync_with_node(&node).await {
                Ok(report) => return Ok(report),
                Err(err) => {
                    warn!("[ln-04] Sync with {} failed: {}", node.identifier, err);
                    if !err.is_transport() {
                        rejected = Some(err);
                    }
                }
            }
        }
        Err(rejected.unwrap_or(PeerSyncError::NoPeerSynced))
    }
}

#[async_trait]
impl<S: KeyValueStore> ConfirmationBroadcaster for PeerSyncService<S> {
    async fn broadcast_confirmation(&self, confirmation: &BlockConfirmation) -> usize {
        match self.confirmation_targets() {
            Ok(targets) => self
                .broadcast(&targets, Outgoing::Confirmation(confirmation))
                .await
                .delivered_count(),
            Err(err) => {
                warn!("[ln-04] Cannot resolve confirmation targets: {}", err);
                0
            }
        }
    }
}
