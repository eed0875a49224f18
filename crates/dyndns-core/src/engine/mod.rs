//! Update propagation engine
//!
//! The engine is responsible for:
//! - Resolving configured record names to provider zones (once, at startup)
//! - Accepting address notifications from any number of producers
//! - Dropping notifications that repeat the last processed address
//! - Reconciling every matching record against the provider
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐
//! │   Poller    │   │ Push source │  ... any number of producers
//! └─────────────┘   └─────────────┘
//!        │ on_new_ip       │
//!        ▼                 ▼
//!   ┌──────────────────────────────┐
//!   │ bounded queue (capacity 10)  │  full queue => producer waits
//!   └──────────────────────────────┘
//!                  │ FIFO
//!                  ▼
//!   ┌──────────────────────────────┐
//!   │ ReconciliationWorker         │  one task, owns actions and
//!   │  dedup → actions → provider  │  last-address slots
//!   └──────────────────────────────┘
//!                  │
//!                  ▼
//!           ┌─────────────┐
//!           │ DnsProvider │
//!           └─────────────┘
//! ```
//!
//! ## Event Flow
//!
//! 1. Address arrives via [`Updater::on_new_ip`] and is queued
//! 2. Worker compares it with the last processed address of its family
//! 3. If new, every action of that family is reconciled in order:
//!    list records, then create one or update those with stale content
//! 4. The address becomes the family's last processed address
//!
//! ## Failure policy
//!
//! A failed provider call stops the worker under [`FailurePolicy::Exit`]:
//! [`WorkerHandle::wait`] resolves with the error and the owner decides
//! how to terminate. Under [`FailurePolicy::Continue`] the error is logged
//! and the remaining actions still run.
//!
//! [`FailurePolicy::Exit`]: crate::config::FailurePolicy::Exit
//! [`FailurePolicy::Continue`]: crate::config::FailurePolicy::Continue

mod actions;
mod worker;

pub use actions::{
    Action, DomainExtractor, extractor_options, registrable_domain_extractor, resolve_actions,
};
pub use worker::{CREATED_RECORD_PROXIED, CREATED_RECORD_TTL};

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::UpdaterConfig;
use crate::error::{Error, Result};
use crate::traits::DnsProvider;
use crate::updater::Updater;
use worker::ReconciliationWorker;

/// Provider-backed updater
///
/// Cheap to share behind an `Arc`; every clone of the inner sender feeds the
/// same worker.
#[derive(Debug, Clone)]
pub struct ProviderUpdater {
    tx: mpsc::Sender<IpAddr>,
    provider_name: &'static str,
}

impl ProviderUpdater {
    /// Resolve the configured records and start the reconciliation worker
    ///
    /// # Parameters
    ///
    /// - `provider`: DNS provider implementation
    /// - `extractor`: maps record names to registrable domains
    /// - `config`: records and engine settings
    ///
    /// # Returns
    ///
    /// The updater to hand to producers, and the handle of the worker task.
    /// Fails without spawning anything if the configuration is invalid or
    /// any zone cannot be resolved.
    pub async fn start(
        provider: Arc<dyn DnsProvider>,
        extractor: &dyn DomainExtractor,
        config: UpdaterConfig,
    ) -> Result<(Self, WorkerHandle)> {
        config.validate()?;

        let actions = resolve_actions(provider.as_ref(), extractor, &config).await?;
        info!(
            provider = provider.provider_name(),
            actions = actions.len(),
            queue_capacity = config.queue_capacity,
            "Starting provider updater"
        );

        let provider_name = provider.provider_name();
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let worker = ReconciliationWorker::new(provider, actions, rx, &config);
        let handle = tokio::spawn(worker.run());

        Ok((Self { tx, provider_name }, WorkerHandle { handle }))
    }

    /// Name of the provider behind this updater
    pub fn provider_name(&self) -> &'static str {
        self.provider_name
    }
}

#[async_trait]
impl Updater for ProviderUpdater {
    async fn on_new_ip(&self, ip: IpAddr) {
        if self.tx.send(ip).await.is_err() {
            warn!(%ip, "Reconciliation worker is gone, dropping notification");
        }
    }
}

/// Handle of the reconciliation worker task
///
/// The worker finishes with `Ok(())` once every [`ProviderUpdater`] clone is
/// dropped and the queue is drained, or with the fatal error that stopped it.
#[derive(Debug)]
pub struct WorkerHandle {
    handle: JoinHandle<Result<()>>,
}

impl WorkerHandle {
    /// Wait for the worker to stop
    pub async fn wait(self) -> Result<()> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::WorkerStopped(e.to_string())),
        }
    }

    /// Whether the worker has already stopped
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the worker without waiting for in-flight reconciliation
    pub fn abort(&self) {
        self.handle.abort();
    }
}
