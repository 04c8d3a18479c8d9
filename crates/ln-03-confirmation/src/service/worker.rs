//! Background task that validates and confirms staged blocks.

use std::sync::Arc;

use ln_01_block_storage::KeyValueStore;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{Candidate, ConfirmationService};

pub struct ConfirmationWorker<S: KeyValueStore> {
    service: Arc<ConfirmationService<S>>,
    pub(super) receiver: mpsc::UnboundedReceiver<Candidate>,
}

impl<S: KeyValueStore + 'static> ConfirmationWorker<S> {
    pub(crate) fn new(
        service: Arc<ConfirmationService<S>>,
        receiver: mpsc::UnboundedReceiver<Candidate>,
    ) -> Self {
        Self { service, receiver }
    }

    /// Process queued candidates until `shutdown` turns true.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("[ln-03] Confirmation worker started");
        loop {
            tokio::select! {
                candidate = self.receiver.recv() => {
                    let Some((number, hash)) = candidate else {
                        break;
                    };
                    if let Err(err) = self.service.confirm(number, &hash).await {
                        warn!("[ln-03] Block {} ({}) not confirmed: {}", number, hash, err);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("[ln-03] Shutdown signal received");
                        break;
                    }
                }
            }
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
