//! # Genesis Block Builder
//!
//! Creates block 0 and, when forced, replaces an existing chain with it.

use std::collections::BTreeMap;
use std::time::Duration;

use ln_01_block_storage::KeyValueStore;
use ln_02_ledger::{
    AlphaAccount, Block, BlockMessage, LedgerError, LedgerService, SignedChangeRequest,
    SignedChangeRequestMessage,
};
use shared_types::{AccountNumber, Node, SigningKey};
use thiserror::Error;
use tracing::{info, warn};

use crate::container::{ConfigError, NodeConfig};

/// Balance given to `--extra-account` unless overridden.
pub const DEFAULT_EXTRA_ACCOUNT_BALANCE: u64 = 100_000;

/// Alpha account root file: `{account: {balance, balance_lock}}`.
pub type AccountRootFile = BTreeMap<AccountNumber, AlphaAccount>;

/// Genesis block creation errors.
#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("Blockchain already exists")]
    AlreadyExists,

    #[error("Account {0} is already in use in account root file")]
    DuplicateExtraAccount(AccountNumber),

    #[error("Failed to read account root file {location}: {message}")]
    Source { location: String, message: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisOptions {
    /// Replace an existing chain.
    pub force: bool,
    pub extra_account: Option<AccountNumber>,
    pub extra_account_balance: u64,
}

impl Default for GenesisOptions {
    fn default() -> Self {
        Self {
            force: false,
            extra_account: None,
            extra_account_balance: DEFAULT_EXTRA_ACCOUNT_BALANCE,
        }
    }
}

fn source_error(location: &str, err: impl std::fmt::Display) -> GenesisError {
    GenesisError::Source {
        location: location.to_owned(),
        message: err.to_string(),
    }
}

/// Load an account root file from a local path or an `http(s)` URL.
pub async fn read_source(location: &str, timeout: Duration) -> Result<AccountRootFile, GenesisError> {
    let body = if location.starts_with("http://") || location.starts_with("https://") {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| source_error(location, err))?;
        let response = client
            .get(location)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| source_error(location, err))?;
        response
            .bytes()
            .await
            .map_err(|err| source_error(location, err))?
            .to_vec()
    } else {
        tokio::fs::read(location)
            .await
            .map_err(|err| source_error(location, err))?
    };

    serde_json::from_slice(&body).map_err(|err| source_error(location, err))
}

/// Fund `account` with `balance`, its lock being the account number.
pub fn add_extra_account(
    accounts: &mut AccountRootFile,
    account: AccountNumber,
    balance: u64,
) -> Result<(), GenesisError> {
    if accounts.contains_key(&account) {
        return Err(GenesisError::DuplicateExtraAccount(account));
    }
    let balance_lock = account.clone().into();
    accounts.insert(
        account,
        AlphaAccount {
            balance,
            balance_lock,
        },
    );
    Ok(())
}

/// Genesis request signed by the primary validator, locked with its identifier.
pub fn build_genesis_request(
    accounts: AccountRootFile,
    primary_validator: &Node,
    signing_key: &SigningKey,
) -> Result<SignedChangeRequest, GenesisError> {
    let message =
        SignedChangeRequestMessage::genesis(primary_validator.identifier.clone().into(), accounts);
    Ok(SignedChangeRequest::create(message, signing_key)?)
}

/// Write block 0 with this node as the primary validator.
///
/// The block lock is held from the existence check until the block is
/// stored, so a concurrent append cannot slip in between clearing and
/// seeding.
pub fn create_genesis<S: KeyValueStore>(
    ledger: &LedgerService<S>,
    config: &NodeConfig,
    mut accounts: AccountRootFile,
    options: &GenesisOptions,
) -> Result<Block, GenesisError> {
    let signing_key = config.signing_key()?;
    let primary_validator = config.own_node()?;

    if let Some(account) = &options.extra_account {
        add_extra_account(&mut accounts, account.clone(), options.extra_account_balance)?;
    }
    let request = build_genesis_request(accounts, &primary_validator, signing_key)?;
    let message = BlockMessage::create_genesis(&request, &primary_validator)?;
    let block = Block::create(message, signing_key)?;

    let guard = ledger.lock().acquire().map_err(LedgerError::from)?;
    if ledger.last_block_number()?.is_some() {
        if !options.force {
            return Err(GenesisError::AlreadyExists);
        }
        warn!("[node] Removing the existing blockchain");
        ledger.clear()?;
    }
    ledger.append(&block, true)?;
    guard.release().map_err(LedgerError::from)?;

    info!(
        "[node] Blockchain genesis complete, primary validator {}",
        primary_validator.identifier
    );
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ln_02_ledger::test_utils::{in_memory_ledger, GenesisFixture};
    use ln_02_ledger::LedgerReader;
    use shared_crypto::generate_key_pair;
    use shared_types::AccountLock;
    use std::io::Write;

    fn config() -> NodeConfig {
        NodeConfig {
            signing_key: Some(generate_key_pair().private),
            ..NodeConfig::default()
        }
    }

    fn root_file() -> (AccountNumber, AccountRootFile) {
        let account = generate_key_pair().public;
        let mut accounts = AccountRootFile::new();
        add_extra_account(&mut accounts, account.clone(), 500).unwrap();
        (account, accounts)
    }

    #[test]
    fn test_genesis_on_empty_ledger() {
        let ledger = in_memory_ledger();
        let config = config();
        let (account, accounts) = root_file();

        let block = create_genesis(&ledger, &config, accounts, &GenesisOptions::default()).unwrap();

        assert_eq!(block.number(), 0);
        assert_eq!(ledger.current_balance(&account).unwrap(), 500);
        let primary = ledger.primary_validator().unwrap().unwrap();
        assert_eq!(primary, config.own_node().unwrap());
        assert_eq!(
            block.message.request.message.account_lock,
            AccountLock::from(primary.identifier.clone())
        );
        assert!(!ledger.lock().is_locked().unwrap());
    }

    #[test]
    fn test_existing_chain_requires_force() {
        let fixture = GenesisFixture::new();
        let (_, accounts) = root_file();

        let err = create_genesis(
            &fixture.ledger,
            &config(),
            accounts,
            &GenesisOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GenesisError::AlreadyExists));
        assert_eq!(fixture.ledger.last_block_number().unwrap(), Some(0));
        assert!(!fixture.ledger.lock().is_locked().unwrap());
    }

    #[test]
    fn test_force_replaces_chain() {
        let fixture = GenesisFixture::new();
        fixture.declare_node(8601);
        let (account, accounts) = root_file();
        let options = GenesisOptions {
            force: true,
            ..GenesisOptions::default()
        };

        create_genesis(&fixture.ledger, &config(), accounts, &options).unwrap();

        assert_eq!(fixture.ledger.last_block_number().unwrap(), Some(0));
        assert_eq!(fixture.ledger.current_balance(&account).unwrap(), 500);
        assert_eq!(
            fixture
                .ledger
                .current_balance(&fixture.treasury.public)
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_extra_account() {
        let ledger = in_memory_ledger();
        let (existing, accounts) = root_file();
        let extra = generate_key_pair().public;
        let options = GenesisOptions {
            extra_account: Some(extra.clone()),
            ..GenesisOptions::default()
        };

        create_genesis(&ledger, &config(), accounts.clone(), &options).unwrap();
        assert_eq!(
            ledger.current_balance(&extra).unwrap(),
            DEFAULT_EXTRA_ACCOUNT_BALANCE
        );
        assert_eq!(ledger.current_lock(&extra).unwrap(), AccountLock::from(extra.clone()));

        let options = GenesisOptions {
            extra_account: Some(existing.clone()),
            force: true,
            ..GenesisOptions::default()
        };
        let err = create_genesis(&ledger, &config(), accounts, &options).unwrap_err();
        assert!(matches!(err, GenesisError::DuplicateExtraAccount(account) if account == existing));
    }

    #[test]
    fn test_missing_signing_key() {
        let (_, accounts) = root_file();
        let err = create_genesis(
            &in_memory_ledger(),
            &NodeConfig::default(),
            accounts,
            &GenesisOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GenesisError::Config(ConfigError::MissingSigningKey)));
    }

    #[tokio::test]
    async fn test_read_source_from_file() {
        let (account, accounts) = root_file();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&serde_json::to_vec(&accounts).unwrap()).unwrap();

        let path = file.path().to_str().unwrap().to_owned();
        let loaded = read_source(&path, Duration::from_secs(1)).await.unwrap();
        assert_eq!(loaded[&account].balance, 500);
    }

    #[tokio::test]
    async fn test_read_source_errors() {
        let err = read_source("/nonexistent/root.json", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GenesisError::Source { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[1, 2]").unwrap();
        let path = file.path().to_str().unwrap().to_owned();
        let err = read_source(&path, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, GenesisError::Source { .. }));
    }
}
