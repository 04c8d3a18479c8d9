//! # Outbound Ports
//!
//! The node API as seen from a client. Every call targets one base address
//! (`http://host:port/`); address fallback lives in the service.

use async_trait::async_trait;
use ln_02_ledger::{Block, BlockRef, SignedChangeRequest};
use ln_03_confirmation::BlockConfirmation;
use shared_types::{Node, Page, Pagination};

use crate::domain::PeerSyncError;

#[async_trait]
pub trait NodeClient: Send + Sync {
    /// `POST api/signed-change-requests/`
    async fn send_signed_change_request(
        &self,
        address: &str,
        request: &SignedChangeRequest,
    ) -> Result<(), PeerSyncError>;

    /// `POST api/blocks/`
    async fn send_block(&self, address: &str, block: &Block) -> Result<(), PeerSyncError>;

    /// `POST api/block-confirmations/`
    async fn send_block_confirmation(
        &self,
        address: &str,
        confirmation: &BlockConfirmation,
    ) -> Result<(), PeerSyncError>;

    /// `GET api/nodes/`
    async fn list_nodes(
        &self,
        address: &str,
        pagination: Pagination,
    ) -> Result<Page<Node>, PeerSyncError>;

    /// `GET api/blocks/?block_number_min=..&block_number_max=..`, both bounds
    /// inclusive.
    async fn list_blocks(
        &self,
        address: &str,
        min_number: Option<u64>,
        max_number: Option<u64>,
        pagination: Pagination,
    ) -> Result<Page<Block>, PeerSyncError>;

    /// `GET api/blocks/<n|last>/`. `None` on 404.
    async fn get_block_raw(
        &self,
        address: &str,
        block: BlockRef,
    ) -> Result<Option<Vec<u8>>, PeerSyncError>;
}
