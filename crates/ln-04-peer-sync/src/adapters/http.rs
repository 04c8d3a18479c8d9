//! # HTTP Node Client
//!
//! JSON over HTTP with `reqwest`. Every request is bounded by the client
//! timeout.

use std::time::Duration;

use async_trait::async_trait;
use ln_02_ledger::{Block, BlockRef, SignedChangeRequest};
use ln_03_confirmation::BlockConfirmation;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{Node, Page, Pagination};
use tracing::debug;

use crate::domain::PeerSyncError;
use crate::ports::NodeClient;

pub const SIGNED_CHANGE_REQUESTS_PATH: &str = "api/signed-change-requests/";
pub const BLOCKS_PATH: &str = "api/blocks/";
pub const BLOCK_CONFIRMATIONS_PATH: &str = "api/block-confirmations/";
pub const NODES_PATH: &str = "api/nodes/";

/// Default bound on one network call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

fn url(address: &str, path: &str) -> String {
    if address.ends_with('/') {
        format!("{address}{path}")
    } else {
        format!("{address}/{path}")
    }
}

fn transport(url: &str, err: reqwest::Error) -> PeerSyncError {
    PeerSyncError::Transport {
        url: url.to_owned(),
        message: err.to_string(),
    }
}

pub struct HttpNodeClient {
    client: Client,
}

impl HttpNodeClient {
    pub fn new(timeout: Duration) -> Result<Self, PeerSyncError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|err| transport("<client>", err))?;
        Ok(Self { client })
    }

    async fn post<T: Serialize + ?Sized + Sync>(
        &self,
        address: &str,
        path: &str,
        body: &T,
    ) -> Result<(), PeerSyncError> {
        let url = url(address, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| transport(&url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PeerSyncError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Body of a GET, `None` on 404.
    async fn get_bytes(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<Vec<u8>>, PeerSyncError> {
        debug!("[ln-04] GET {} {:?}", url, query);
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|err| transport(url, err))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(PeerSyncError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(|err| transport(url, err))?;
        Ok(Some(body.to_vec()))
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        address: &str,
        path: &str,
        mut query: Vec<(&str, String)>,
        pagination: Pagination,
    ) -> Result<Page<T>, PeerSyncError> {
        let url = url(address, path);
        query.push(("offset", pagination.offset.to_string()));
        query.push(("limit", pagination.limit.to_string()));

        let body = self
            .get_bytes(&url, &query)
            .await?
            .ok_or_else(|| PeerSyncError::Status {
                url: url.clone(),
                status: StatusCode::NOT_FOUND.as_u16(),
            })?;
        serde_json::from_slice(&body).map_err(|err| PeerSyncError::Decode {
            url,
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn send_signed_change_request(
        &self,
        address: &str,
        request: &SignedChangeRequest,
    ) -> Result<(), PeerSyncError> {
        self.post(address, SIGNED_CHANGE_REQUESTS_PATH, request).await
    }

    async fn send_block(&self, address: &str, block: &Block) -> Result<(), PeerSyncError> {
        self.post(address, BLOCKS_PATH, block).await
    }

    async fn send_block_confirmation(
        &self,
        address: &str,
        confirmation: &BlockConfirmation,
    ) -> Result<(), PeerSyncError> {
        self.post(address, BLOCK_CONFIRMATIONS_PATH, confirmation)
            .await
    }

    async fn list_nodes(
        &self,
        address: &str,
        pagination: Pagination,
    ) -> Result<Page<Node>, PeerSyncError> {
        self.get_page(address, NODES_PATH, Vec::new(), pagination)
            .await
    }

    async fn list_blocks(
        &self,
        address: &str,
        min_number: Option<u64>,
        max_number: Option<u64>,
        pagination: Pagination,
    ) -> Result<Page<Block>, PeerSyncError> {
        let mut query = Vec::new();
        if let Some(min) = min_number {
            query.push(("block_number_min", min.to_string()));
        }
        if let Some(max) = max_number {
            query.push(("block_number_max", max.to_string()));
        }
        self.get_page(address, BLOCKS_PATH, query, pagination).await
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
        let url = url(address, &format!("{BLOCKS_PATH}{selector}/"));
        self.get_bytes(&url, &[]).await
    }
}
