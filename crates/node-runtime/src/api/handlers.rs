//! Request handlers behind the node API.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use ln_01_block_storage::KeyValueStore;
use ln_02_ledger::{Block, BlockRef, LedgerError, LedgerReader, LedgerService, SignedChangeRequest};
use ln_03_confirmation::{BlockConfirmation, ConfirmationError, ConfirmationService};
use ln_04_peer_sync::{Outgoing, PeerSyncService};
use serde_json::Value;
use shared_types::{AccountNumber, SigningKey, ValidationError};
use tracing::{error, info, warn};

use super::{route, ApiHandler, ApiRequest, ApiResponse, ListQuery, Route};

fn parse_json(body: &[u8]) -> Result<Value, ValidationError> {
    serde_json::from_slice(body).map_err(|err| ValidationError::non_field(err.to_string()))
}

fn ledger_error(err: LedgerError) -> ApiResponse {
    if let LedgerError::LockContention(_) = err {
        return ApiResponse::errors(409, &err.to_validation_error());
    }
    if err.is_invariant_violation() {
        error!("[ln-02] Ledger invariant violated: {}", err);
        return ApiResponse::internal(err);
    }
    ApiResponse::bad_request(&err.to_validation_error())
}

fn confirmation_error(err: ConfirmationError) -> ApiResponse {
    match err {
        ConfirmationError::Structural(errors) => ApiResponse::bad_request(&errors),
        ConfirmationError::InvalidSignature => {
            ApiResponse::bad_request(&ValidationError::field("signature", "Invalid signature."))
        }
        ConfirmationError::UnauthorizedSigner(_) => ApiResponse::bad_request(
            &ValidationError::field("signer", "Not a confirmation validator."),
        ),
        ConfirmationError::Fork { .. } => {
            ApiResponse::errors(409, &ValidationError::non_field(err.to_string()))
        }
        ConfirmationError::Ledger(err) => ledger_error(err),
        other => {
            error!("[ln-03] {}", other);
            ApiResponse::internal(other)
        }
    }
}

fn not_a_confirmation_validator() -> ApiResponse {
    ApiResponse::errors(
        403,
        &ValidationError::non_field("This node does not confirm blocks."),
    )
}

pub struct NodeApi<S: KeyValueStore> {
    ledger: LedgerService<S>,
    signing_key: SigningKey,
    identity: AccountNumber,
    peers: Arc<PeerSyncService<S>>,
    confirmation: Option<Arc<ConfirmationService<S>>>,
}

impl<S: KeyValueStore> NodeApi<S> {
    pub fn new(
        ledger: LedgerService<S>,
        signing_key: SigningKey,
        identity: AccountNumber,
        peers: Arc<PeerSyncService<S>>,
        confirmation: Option<Arc<ConfirmationService<S>>>,
    ) -> Self {
        Self {
            ledger,
            signing_key,
            identity,
            peers,
            confirmation,
        }
    }

    // === SIGNED CHANGE REQUESTS ===

    /// Validate a request, then either turn it into the next block (on the
    /// primary validator) or forward it to the primary validator.
    pub async fn submit_signed_change_request(&self, body: &[u8]) -> ApiResponse {
        let request =
            match parse_json(body).and_then(|value| SignedChangeRequest::from_value(&value)) {
                Ok(request) => request,
                Err(errors) => return ApiResponse::bad_request(&errors),
            };
        if request.is_genesis() {
            return ApiResponse::bad_request(&ValidationError::field(
                "message.type",
                "Invalid value.",
            ));
        }
        if let Err(err) = request.validate(&self.ledger) {
            return ledger_error(err);
        }

        match self.ledger.primary_validator() {
            Ok(Some(primary)) if primary.identifier == self.identity => {
                self.produce_block(&request).await
            }
            Ok(Some(primary)) => {
                match self
                    .peers
                    .send_to_node(&primary, Outgoing::Request(&request))
                    .await
                {
                    Ok(address) => {
                        info!("[ln-04] Forwarded request to primary validator at {}", address);
                        ApiResponse::empty(202)
                    }
                    Err(err) => {
                        ApiResponse::errors(503, &ValidationError::non_field(err.to_string()))
                    }
                }
            }
            Ok(None) => ApiResponse::errors(
                503,
                &ValidationError::non_field("Primary validator is unknown."),
            ),
            Err(err) => ledger_error(err),
        }
    }

    async fn produce_block(&self, request: &SignedChangeRequest) -> ApiResponse {
        let block = match self.ledger.add_block_from_signed_change_request(
            request,
            &self.signing_key,
            true,
        ) {
            Ok(block) => block,
            Err(err) => return ledger_error(err),
        };

        match self.peers.broadcast_block(&block).await {
            Ok(report) => {
                for (node, err) in &report.failed {
                    warn!(
                        "[ln-04] Block {} not delivered to {}: {}",
                        block.number(),
                        node,
                        err
                    );
                }
            }
            Err(err) => warn!("[ln-04] Block {} not broadcast: {}", block.number(), err),
        }
        ApiResponse::empty(202)
    }

    // === BLOCKS ===

    pub fn submit_block(&self, body: &[u8]) -> ApiResponse {
        let Some(confirmation) = &self.confirmation else {
            return not_a_confirmation_validator();
        };
        let block = match Block::from_slice(body) {
            Ok(block) => block,
            Err(errors) => return ApiResponse::bad_request(&errors),
        };
        match confirmation.stage_block(block) {
            Ok(_) => ApiResponse::empty(204),
            Err(err) => confirmation_error(err),
        }
    }

    pub fn list_blocks(&self, query: &ListQuery) -> ApiResponse {
        let page = match self.ledger.list_blocks_raw(
            query.block_number_min,
            query.block_number_max,
            query.pagination,
        ) {
            Ok(page) => page,
            Err(err) => return ledger_error(err),
        };

        // Stored bodies are passed through byte for byte.
        let mut body = format!("{{\"count\":{},\"results\":[", page.count).into_bytes();
        for (index, raw) in page.results.iter().enumerate() {
            if index > 0 {
                body.push(b',');
            }
            body.extend_from_slice(raw);
        }
        body.extend_from_slice(b"]}");
        ApiResponse::raw(200, body)
    }

    pub fn get_block(&self, selector: &str) -> ApiResponse {
        let block = match BlockRef::from_str(selector) {
            Ok(block) => block,
            Err(errors) => return ApiResponse::bad_request(&errors),
        };
        match self.ledger.get_block_raw(block) {
            Ok(Some(body)) => ApiResponse::raw(200, body),
            Ok(None) => ApiResponse::not_found(),
            Err(err) => ledger_error(err),
        }
    }

    // === CONFIRMATIONS ===

    pub fn submit_block_confirmation(&self, body: &[u8]) -> ApiResponse {
        let Some(service) = &self.confirmation else {
            return not_a_confirmation_validator();
        };
        let confirmation =
            match parse_json(body).and_then(|value| BlockConfirmation::from_value(&value)) {
                Ok(confirmation) => confirmation,
                Err(errors) => return ApiResponse::bad_request(&errors),
            };
        match service.receive_confirmation(&confirmation) {
            Ok(_) => ApiResponse::empty(201),
            Err(err) => confirmation_error(err),
        }
    }

    // === NODES ===

    pub fn list_nodes(&self, query: &ListQuery) -> ApiResponse {
        match self.ledger.list_nodes(query.pagination) {
            Ok(page) => ApiResponse::json(200, &page),
            Err(err) => ledger_error(err),
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> ApiHandler for NodeApi<S> {
    async fn handle(&self, request: ApiRequest) -> ApiResponse {
        let route = match route(&request) {
            Ok(route) => route,
            Err(response) => return response,
        };
        match route {
            Route::SubmitRequest => self.submit_signed_change_request(&request.body).await,
            Route::SubmitBlock => self.submit_block(&request.body),
            Route::SubmitConfirmation => self.submit_block_confirmation(&request.body),
            Route::GetBlock(selector) => self.get_block(selector),
            Route::ListBlocks => match ListQuery::from_request(&request) {
                Ok(query) => self.list_blocks(&query),
                Err(errors) => ApiResponse::bad_request(&errors),
            },
            Route::ListNodes => match ListQuery::from_request(&request) {
                Ok(query) => self.list_nodes(&query),
                Err(errors) => ApiResponse::bad_request(&errors),
            },
        }
    }
}
