//! # Node API
//!
//! The REST surface of a node without an HTTP framework attached. A
//! transport turns its request into an [`ApiRequest`], calls
//! [`ApiHandler::handle`] and writes the [`ApiResponse`] back.
//!
//! | Method | Path | Success |
//! |--------|------|---------|
//! | POST | `api/signed-change-requests/` | 202 |
//! | POST | `api/blocks/` | 204 |
//! | GET | `api/blocks/` | 200 `{count, results}` with raw block bodies |
//! | GET | `api/blocks/<n\|last>/` | 200 raw block body, 404 |
//! | POST | `api/block-confirmations/` | 201 |
//! | GET | `api/nodes/` | 200 `{count, results}` |
//!
//! Validation failures are 400 with a field-path keyed body, e.g.
//! `{"message.type": ["Invalid value."]}`.

mod handlers;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use shared_types::{Pagination, ValidationError, DEFAULT_PAGE_SIZE};

pub use handlers::NodeApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the node's base address, e.g. `api/blocks/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body,
        }
    }

    pub fn with_query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_owned(), value.to_string()));
        self
    }

    fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    pub fn raw(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn json<T: Serialize + ?Sized>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self { status, body },
            Err(err) => Self::internal(err),
        }
    }

    pub fn errors(status: u16, errors: &ValidationError) -> Self {
        Self::json(status, &errors.to_json())
    }

    pub fn bad_request(errors: &ValidationError) -> Self {
        Self::errors(400, errors)
    }

    pub fn not_found() -> Self {
        Self::json(404, &json!({"detail": "Not found."}))
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::errors(500, &ValidationError::non_field(err.to_string()))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body parsed as JSON, `None` when empty or not JSON.
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

#[async_trait]
pub trait ApiHandler: Send + Sync {
    async fn handle(&self, request: ApiRequest) -> ApiResponse;
}

/// Filters and window of a list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub pagination: Pagination,
    pub block_number_min: Option<u64>,
    pub block_number_max: Option<u64>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            pagination: Pagination::new(0, DEFAULT_PAGE_SIZE),
            block_number_min: None,
            block_number_max: None,
        }
    }
}

impl ListQuery {
    pub fn from_request(request: &ApiRequest) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::default();
        let mut number = |name: &str| -> Option<u64> {
            let value = request.query_param(name)?;
            match value.parse() {
                Ok(number) => Some(number),
                Err(_) => {
                    errors.push(name, "A valid integer is required.");
                    None
                }
            }
        };

        let offset = number("offset");
        let limit = number("limit");
        let block_number_min = number("block_number_min");
        let block_number_max = number("block_number_max");
        errors.into_result()?;

        let offset = usize::try_from(offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = limit
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Ok(Self {
            pagination: Pagination::new(offset, limit),
            block_number_min,
            block_number_max,
        })
    }
}

// === ROUTES ===

pub const SIGNED_CHANGE_REQUESTS: &str = "api/signed-change-requests/";
pub const BLOCKS: &str = "api/blocks/";
pub const BLOCK_CONFIRMATIONS: &str = "api/block-confirmations/";
pub const NODES: &str = "api/nodes/";

pub(crate) enum Route<'a> {
    SubmitRequest,
    SubmitBlock,
    ListBlocks,
    GetBlock(&'a str),
    SubmitConfirmation,
    ListNodes,
}

/// Match a request to a route. `Err` carries the response for unknown
/// paths (404) and known paths with the wrong method (405).
pub(crate) fn route(request: &ApiRequest) -> Result<Route<'_>, ApiResponse> {
    let path = request.path.trim_start_matches('/');
    let method = request.method;
    let matched = match path {
        SIGNED_CHANGE_REQUESTS => (method == Method::Post).then_some(Route::SubmitRequest),
        BLOCKS => Some(match method {
            Method::Get => Route::ListBlocks,
            Method::Post => Route::SubmitBlock,
        }),
        BLOCK_CONFIRMATIONS => (method == Method::Post).then_some(Route::SubmitConfirmation),
        NODES => (method == Method::Get).then_some(Route::ListNodes),
        other => {
            let selector = other
                .strip_prefix(BLOCKS)
                .and_then(|rest| rest.strip_suffix('/'))
                .filter(|selector| !selector.is_empty() && !selector.contains('/'));
            match selector {
                Some(selector) => (method == Method::Get).then_some(Route::GetBlock(selector)),
                None => return Err(ApiResponse::not_found()),
            }
        }
    };
    matched.ok_or_else(|| ApiResponse::json(405, &json!({"detail": "Method not allowed."})))
}
