use async_trait::async_trait;
use std::net::IpAddr;
use tracing::debug;

use super::Updater;
use crate::config::UpdaterConfig;

/// Updater that only logs what it receives
#[derive(Debug, Clone)]
pub struct NoopUpdater {
    config: UpdaterConfig,
}

impl NoopUpdater {
    pub fn new(config: UpdaterConfig) -> Self {
        Self { config }
    }

    /// Records that would have been updated
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }
}

#[async_trait]
impl Updater for NoopUpdater {
    async fn on_new_ip(&self, ip: IpAddr) {
        debug!(updater = "noop", %ip, "Received new IP");
    }
}
