//! # Node Configuration
//!
//! Defaults plus `LN_*` environment overrides. Malformed values are errors,
//! never silently ignored.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `LN_SIGNING_KEY` | node signing key (hex) |
//! | `LN_NODE_ADDRESSES` | comma separated base URLs of this node |
//! | `LN_NODE_FEE` | declared node fee |
//! | `LN_DATA_DIR` | store file and lock files |
//! | `LN_QUORUM` | distinct confirmations needed to accept a block |
//! | `LN_CONFIRMATION_VALIDATORS` | comma separated node identifiers |
//! | `LN_REQUEST_TIMEOUT_SECS` | bound on one network call |
//! | `LN_PAGE_SIZE` | page size for peer listings |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ln_03_confirmation::ConfirmationConfig;
use shared_crypto::derive_public_key;
use shared_types::{AccountNumber, Node, SigningKey, DEFAULT_PAGE_SIZE};
use thiserror::Error;

pub const ENV_PREFIX: &str = "LN_";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("LN_{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Signing key is not configured, set LN_SIGNING_KEY")]
    MissingSigningKey,
}

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub signing_key: Option<SigningKey>,
    pub node_addresses: Vec<String>,
    pub node_fee: u64,
    pub data_dir: PathBuf,
    pub quorum: usize,
    pub confirmation_validators: Vec<AccountNumber>,
    pub request_timeout: Duration,
    pub page_size: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            signing_key: None,
            node_addresses: vec!["http://127.0.0.1:8555/".to_owned()],
            node_fee: 4,
            data_dir: PathBuf::from("./data"),
            quorum: 1,
            confirmation_validators: Vec::new(),
            request_timeout: Duration::from_secs(2),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        var,
        value: value.to_owned(),
        reason: err.to_string(),
    })
}

fn parse_list<T>(var: &'static str, value: &str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse(var, item))
        .collect()
}

impl NodeConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by `lookup`, called with full variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(&format!("{ENV_PREFIX}{var}"));
        let mut config = Self::default();

        if let Some(value) = get("SIGNING_KEY") {
            config.signing_key = Some(parse("SIGNING_KEY", &value)?);
        }
        if let Some(value) = get("NODE_ADDRESSES") {
            config.node_addresses = parse_list("NODE_ADDRESSES", &value)?;
        }
        if let Some(value) = get("NODE_FEE") {
            config.node_fee = parse("NODE_FEE", &value)?;
        }
        if let Some(value) = get("DATA_DIR") {
            config.data_dir = PathBuf::from(value);
        }
        if let Some(value) = get("QUORUM") {
            config.quorum = parse("QUORUM", &value)?;
            if config.quorum == 0 {
                return Err(ConfigError::Invalid {
                    var: "QUORUM",
                    value,
                    reason: "must be at least 1".to_owned(),
                });
            }
        }
        if let Some(value) = get("CONFIRMATION_VALIDATORS") {
            config.confirmation_validators = parse_list("CONFIRMATION_VALIDATORS", &value)?;
        }
        if let Some(value) = get("REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(parse("REQUEST_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = get("PAGE_SIZE") {
            config.page_size = parse("PAGE_SIZE", &value)?;
            if config.page_size == 0 {
                return Err(ConfigError::Invalid {
                    var: "PAGE_SIZE",
                    value,
                    reason: "must be at least 1".to_owned(),
                });
            }
        }

        Ok(config)
    }

    pub fn signing_key(&self) -> Result<&SigningKey, ConfigError> {
        self.signing_key.as_ref().ok_or(ConfigError::MissingSigningKey)
    }

    /// Node identifier derived from the signing key.
    pub fn identity(&self) -> Result<AccountNumber, ConfigError> {
        derive_public_key(self.signing_key()?).map_err(|err| ConfigError::Invalid {
            var: "SIGNING_KEY",
            value: "<redacted>".to_owned(),
            reason: err.to_string(),
        })
    }

    /// This node as it appears in the registry.
    pub fn own_node(&self) -> Result<Node, ConfigError> {
        Ok(Node {
            identifier: self.identity()?,
            addresses: self.node_addresses.clone(),
            fee: self.node_fee,
        })
    }

    pub fn confirmation_config(&self) -> ConfirmationConfig {
        ConfirmationConfig {
            quorum: self.quorum,
            confirmation_validators: self.confirmation_validators.clone(),
        }
    }

    /// Whether this node takes part in confirming blocks.
    pub fn is_confirmation_validator(&self, identity: &AccountNumber) -> bool {
        self.confirmation_validators.is_empty() || self.confirmation_validators.contains(identity)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("ledger.db")
    }
}
