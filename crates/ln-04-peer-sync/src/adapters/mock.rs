//! In-memory node client for tests and local simulations.
//!
//! Peers are keyed by address. An address with no registered peer behaves
//! like a host that refuses connections.

use std::collections::HashMap;

use async_trait::async_trait;
use ln_02_ledger::{Block, BlockRef, SignedChangeRequest};
use ln_03_confirmation::BlockConfirmation;
use parking_lot::Mutex;
use shared_types::{Node, Page, Pagination};

use crate::domain::PeerSyncError;
use crate::ports::NodeClient;

/// State served by one fake peer.
#[derive(Debug, Clone, Default)]
pub struct MockPeer {
    pub nodes: Vec<Node>,
    /// Chain in block order.
    pub blocks: Vec<Block>,
    /// Block listing fails once a page would reach this number.
    pub fail_from: Option<u64>,
    /// Status returned for pushed messages, `None` for success.
    pub reject_with: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SentMessage {
    Request(SignedChangeRequest),
    Block(Block),
    Confirmation(BlockConfirmation),
}

#[derive(Default)]
pub struct MockNodeClient {
    peers: Mutex<HashMap<String, MockPeer>>,
    sent: Mutex<Vec<(String, SentMessage)>>,
}

fn page<T: Clone>(items: &[T], pagination: Pagination) -> Page<T> {
    Page {
        count: items.len(),
        results: items
            .iter()
            .skip(pagination.offset)
            .take(pagination.limit)
            .cloned()
            .collect(),
    }
}

impl MockNodeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peer(&self, address: impl Into<String>, peer: MockPeer) {
        self.peers.lock().insert(address.into(), peer);
    }

    /// Every message pushed so far, with the address it went to.
    pub fn sent(&self) -> Vec<(String, SentMessage)> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<SentMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| to == address)
            .map(|(_, message)| message.clone())
            .collect()
    }

    fn peer(&self, address: &str) -> Result<MockPeer, PeerSyncError> {
        self.peers
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| PeerSyncError::Transport {
                url: address.to_owned(),
                message: "connection refused".to_owned(),
            })
    }

    fn push(&self, address: &str, message: SentMessage) -> Result<(), PeerSyncError> {
        let peer = self.peer(address)?;
        if let Some(status) = peer.reject_with {
            return Err(PeerSyncError::Status {
                url: address.to_owned(),
                status,
            });
        }
        self.sent.lock().push((address.to_owned(), message));
        Ok(())
    }
}

#[async_trait]
impl NodeClient for MockNodeClient {
    async fn send_signed_change_request(
        &self,
        address: &str,
        request: &SignedChangeRequest,
    ) -> Result<(), PeerSyncError> {
        self.push(address, SentMessage::Request(request.clone()))
    }

    async fn send_block(&self, address: &str, block: &Block) -> Result<(), PeerSyncError> {
        self.push(address, SentMessage::Block(block.clone()))
    }

    async fn send_block_confirmation(
        &self,
        address: &str,
        confirmation: &BlockConfirmation,
    ) -> Result<(), PeerSyncError> {
        self.push(address, SentMessage::Confirmation(confirmation.clone()))
    }

    async fn list_nodes(
        &self,
        address: &str,
        pagination: Pagination,
    ) -> Result<Page<Node>, PeerSyncError> {
        Ok(page(&self.peer(address)?.nodes, pagination))
    }

    async fn list_blocks(
        &self,
        address: &str,
        min_number: Option<u64>,
        max_number: Option<u64>,
        pagination: Pagination,
    ) -> Result<Page<Block>, PeerSyncError> {
        let peer = self.peer(address)?;
        let blocks: Vec<Block> = peer
            .blocks
            .into_iter()
            .filter(|block| min_number.map_or(true, |min| block.number() >= min))
            .filter(|block| max_number.map_or(true, |max| block.number() <= max))
            .collect();
        let page = page(&blocks, pagination);

        if let Some(fail_from) = peer.fail_from {
            if page.results.iter().any(|block| block.number() >= fail_from) {
                return Err(PeerSyncError::Status {
                    url: address.to_owned(),
                    status: 503,
                });
            }
        }
        Ok(page)
    }

    async fn get_block_raw(
        &self,
        address: &str,
        block: BlockRef,
    ) -> Result<Option<Vec<u8>>, PeerSyncError> {
        let peer = self.peer(address)?;
        let found = match block {
            BlockRef::Number(number) => peer.blocks.iter().find(|b| b.number() == number),
            BlockRef::Last => peer.blocks.last(),
        };
        found
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|err| PeerSyncError::Decode {
                url: address.to_owned(),
                message: err.to_string(),
            })
    }
}
