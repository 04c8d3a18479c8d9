//! # Node Container
//!
//! Builds one node from its configuration and owns the pieces that make it
//! up. Services are created in dependency order:
//!
//! 1. Ledger (ln-02) over the keyed store and block lock (ln-01)
//! 2. Peer sync (ln-04) over a node client
//! 3. Confirmation (ln-03), broadcasting through peer sync, when this node
//!    is a confirmation validator
//! 4. API handlers over all of the above
//!
//! The confirmation worker runs from [`LedgerNode::start`] until
//! [`LedgerNode::shutdown`].

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ln_01_block_storage::{FileBackedKVStore, FileLock, KeyValueStore};
use ln_02_ledger::LedgerService;
use ln_03_confirmation::{ConfirmationService, ConfirmationWorker};
use ln_04_peer_sync::{HttpNodeClient, NodeClient, PeerSyncError, PeerSyncService, SyncReport};
use parking_lot::{Mutex, RwLock};
use shared_types::AccountNumber;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::api::{ApiHandler, NodeApi};

pub use config::{ConfigError, NodeConfig};

/// Bound on waiting for the worker to stop.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct LedgerNode<S: KeyValueStore> {
    config: NodeConfig,
    identity: AccountNumber,
    ledger: LedgerService<S>,
    peers: Arc<PeerSyncService<S>>,
    confirmation: Option<Arc<ConfirmationService<S>>>,
    api: Arc<NodeApi<S>>,
    worker: Mutex<Option<ConfirmationWorker<S>>>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl LedgerNode<FileBackedKVStore> {
    /// Node over the store file and lock directory under `config.data_dir`,
    /// talking to peers over HTTP.
    pub fn open(config: NodeConfig) -> Result<Self> {
        let lock = FileLock::new(&config.data_dir)
            .with_context(|| format!("Failed to prepare {}", config.data_dir.display()))?;
        let store = FileBackedKVStore::open(config.store_path())
            .with_context(|| format!("Failed to open {}", config.store_path().display()))?;
        let ledger = LedgerService::new(Arc::new(RwLock::new(store)), Arc::new(lock));
        let client = HttpNodeClient::new(config.request_timeout)
            .context("Failed to build the HTTP client")?;
        Self::new(config, ledger, Arc::new(client))
    }
}

impl<S: KeyValueStore + 'static> LedgerNode<S> {
    pub fn new(
        config: NodeConfig,
        ledger: LedgerService<S>,
        client: Arc<dyn NodeClient>,
    ) -> Result<Self> {
        let signing_key = config.signing_key()?.clone();
        let identity = config.identity()?;
        info!("[node] Creating node {}", identity);

        let peers = Arc::new(
            PeerSyncService::new(ledger.clone(), client, identity.clone(), config.page_size)
                .with_confirmation_validators(config.confirmation_validators.clone()),
        );

        let (confirmation, worker) = if config.is_confirmation_validator(&identity) {
            let (service, worker) = ConfirmationService::new(
                ledger.clone(),
                peers.clone(),
                signing_key.clone(),
                config.confirmation_config(),
            )?;
            info!(
                "[ln-03] Confirming blocks with quorum {}",
                config.quorum
            );
            (Some(service), Some(worker))
        } else {
            (None, None)
        };

        let api = Arc::new(NodeApi::new(
            ledger.clone(),
            signing_key,
            identity.clone(),
            peers.clone(),
            confirmation.clone(),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            identity,
            ledger,
            peers,
            confirmation,
            api,
            worker: Mutex::new(worker),
            worker_handle: Mutex::new(None),
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn identity(&self) -> &AccountNumber {
        &self.identity
    }

    pub fn ledger(&self) -> &LedgerService<S> {
        &self.ledger
    }

    pub fn peers(&self) -> Arc<PeerSyncService<S>> {
        self.peers.clone()
    }

    pub fn confirmation(&self) -> Option<Arc<ConfirmationService<S>>> {
        self.confirmation.clone()
    }

    pub fn api(&self) -> Arc<NodeApi<S>> {
        self.api.clone()
    }

    /// The API as a transport sees it.
    pub fn handler(&self) -> Arc<dyn ApiHandler> {
        self.api.clone()
    }

    /// Start background work. Calling it again is a no-op.
    pub fn start(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let handle = worker.spawn(self.shutdown_rx.clone());
        *self.worker_handle.lock() = Some(handle);
        info!("[node] Node {} started", self.identity);
    }

    /// Catch up with the network before serving.
    pub async fn sync(&self) -> Result<SyncReport, PeerSyncError> {
        self.peers.sync_with_network().await
    }

    /// Signal background work to stop and wait for it.
    pub async fn shutdown(&self) {
        info!("[node] Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("[node] Failed to send shutdown signal: {}", e);
        }

        let handle = self.worker_handle.lock().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!("[ln-03] Confirmation worker failed: {}", err),
                Err(_) => warn!("[ln-03] Confirmation worker did not stop in time"),
            }
        }
        info!("[node] Shutdown complete");
    }
}
