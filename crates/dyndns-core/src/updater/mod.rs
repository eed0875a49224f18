//! The ingress of the synchronizer
//!
//! Everything that learns about an address (the router poller, a push
//! endpoint) hands it to an [`Updater`]. What happens next depends on the
//! variant:
//!
//! - [`NoopUpdater`]: logs the address and does nothing else (dry runs)
//! - [`ProviderUpdater`](crate::engine::ProviderUpdater): queues the address
//!   for the reconciliation worker

mod noop;

pub use noop::NoopUpdater;

use async_trait::async_trait;
use std::net::IpAddr;

/// Capability to accept one newly observed address
///
/// Implementations must not process the address inline. They may make the
/// caller wait for queue space, but never for provider I/O.
#[async_trait]
pub trait Updater: Send + Sync {
    /// Accept one address
    async fn on_new_ip(&self, ip: IpAddr);
}
