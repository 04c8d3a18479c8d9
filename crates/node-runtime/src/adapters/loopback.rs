//! In-process transport between nodes.
//!
//! Each registered address maps to a node's API handler. Requests are
//! encoded and decoded exactly as over HTTP, so a network of nodes behaves
//! the same in one process as it does across hosts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ln_02_ledger::{Block, BlockRef, SignedChangeRequest};
use ln_03_confirmation::BlockConfirmation;
use ln_04_peer_sync::{NodeClient, PeerSyncError};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{Node, Page, Pagination};

use crate::api::{
    ApiHandler, ApiRequest, ApiResponse, BLOCKS, BLOCK_CONFIRMATIONS, NODES,
    SIGNED_CHANGE_REQUESTS,
};

#[derive(Default)]
pub struct LoopbackNodeClient {
    handlers: RwLock<HashMap<String, Arc<dyn ApiHandler>>>,
}

impl LoopbackNodeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `address` with `handler`, replacing any previous handler.
    pub fn register(&self, address: impl Into<String>, handler: Arc<dyn ApiHandler>) {
        self.handlers.write().insert(address.into(), handler);
    }

    /// Make `address` unreachable.
    pub fn unregister(&self, address: &str) {
        self.handlers.write().remove(address);
    }

    async fn call(&self, address: &str, request: ApiRequest) -> Result<ApiResponse, PeerSyncError> {
        let url = format!("{address}{}", request.path);
        // The guard is dropped before the handler runs.
        let handler = self.handlers.read().get(address).cloned();
        let handler = handler.ok_or_else(|| PeerSyncError::Transport {
            url: url.clone(),
            message: "connection refused".to_owned(),
        })?;
        Ok(handler.handle(request).await)
    }

    async fn post<T: Serialize + ?Sized + Sync>(
        &self,
        address: &str,
        path: &str,
        body: &T,
    ) -> Result<(), PeerSyncError> {
        let url = format!("{address}{path}");
        let body = serde_json::to_vec(body).map_err(|err| PeerSyncError::Decode {
            url: url.clone(),
            message: err.to_string(),
        })?;
        let response = self.call(address, ApiRequest::post(path, body)).await?;
        if !response.is_success() {
            return Err(PeerSyncError::Status {
                url,
                status: response.status,
            });
        }
        Ok(())
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        address: &str,
        request: ApiRequest,
        pagination: Pagination,
    ) -> Result<Page<T>, PeerSyncError> {
        let url = format!("{address}{}", request.path);
        let request = request
            .with_query("offset", pagination.offset)
            .with_query("limit", pagination.limit);
        let response = self.call(address, request).await?;
        if !response.is_success() {
            return Err(PeerSyncError::Status {
                url,
                status: response.status,
            });
        }
        serde_json::from_slice(&response.body).map_err(|err| PeerSyncError::Decode {
            url,
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl NodeClient for LoopbackNodeClient {
    async fn send_signed_change_request(
        &self,
        address: &str,
        request: &SignedChangeRequest,
    ) -> Result<(), PeerSyncError> {
        self.post(address, SIGNED_CHANGE_REQUESTS, request).await
    }

    async fn send_block(&self, address: &str, block: &Block) -> Result<(), PeerSyncError> {
        self.post(address, BLOCKS, block).await
    }

    async fn send_block_confirmation(
        &self,
        address: &str,
        confirmation: &BlockConfirmation,
    ) -> Result<(), PeerSyncError> {
        self.post(address, BLOCK_CONFIRMATIONS, confirmation).await
    }

    async fn list_nodes(
        &self,
        address: &str,
        pagination: Pagination,
    ) -> Result<Page<Node>, PeerSyncError> {
        self.get_page(address, ApiRequest::get(NODES), pagination)
            .await
    }

    async fn list_blocks(
        &self,
        address: &str,
        min_number: Option<u64>,
        max_number: Option<u64>,
        pagination: Pagination,
    ) -> Result<Page<Block>, PeerSyncError> {
        let mut request = ApiRequest::get(BLOCKS);
        if let Some(min) = min_number {
            request = request.with_query("block_number_min", min);
        }
        if let Some(max) = max_number {
            request = request.with_query("block_number_max", max);
        }
        self.get_page(address, request, pagination).await
    }

    async fn get_block_raw(
        &self,
        address: &str,
        block: BlockRef,
    ) -> Result<Option<Vec<u8>>, PeerSyncError> {
        let selector = match block {
            BlockRef::Number(number) => number.to_string(),
            BlockRef::Last => "last".to_owned(),
        };
        let path = format!("{BLOCKS}{selector}/");
        let url = format!("{address}{path}");
        let response = self.call(address, ApiRequest::get(path)).await?;
        match response.status {
            404 => Ok(None),
            status if (200..300).contains(&status) => Ok(Some(response.body)),
            status => Err(PeerSyncError::Status { url, status }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Teapot;

    #[async_trait]
    impl ApiHandler for Teapot {
        async fn handle(&self, _request: ApiRequest) -> ApiResponse {
            ApiResponse::empty(418)
        }
    }

    #[tokio::test]
    async fn test_unknown_address_is_refused() {
        let client = LoopbackNodeClient::new();
        let err = client
            .list_nodes("http://127.0.0.1:9000/", Pagination::new(0, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, PeerSyncError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let client = LoopbackNodeClient::new();
        client.register("http://127.0.0.1:9000/", Arc::new(Teapot));

        let err = client
            .get_block_raw("http://127.0.0.1:9000/", BlockRef::Last)
            .await
            .unwrap_err();
        assert!(matches!(err, PeerSyncError::Status { status: 418, .. }));

        client.unregister("http://127.0.0.1:9000/");
        let err = client
            .get_block_raw("http://127.0.0.1:9000/", BlockRef::Last)
            .await
            .unwrap_err();
        assert!(matches!(err, PeerSyncError::Transport { .. }));
    }
}
