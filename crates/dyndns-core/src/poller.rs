//! Periodic router polling
//!
//! The poller asks an [`AddressSource`] for the current WAN addresses on a
//! fixed interval and forwards them to an [`Updater`]. Deciding whether a
//! DNS change is needed is left to the updater; the poller only avoids
//! flooding it with unchanged IPv6 addresses and logs what is new.
//!
//! With a host suffix configured, the IPv6 address is not taken from the
//! router's WAN interface but built from the delegated prefix and the
//! suffix (see [`crate::prefix`]), which yields the public address of a
//! LAN device instead of the router's own.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, info, warn};

use crate::prefix;
use crate::traits::AddressSource;
use crate::updater::Updater;

/// Default polling interval when the configured one is unusable
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Router poll loop
pub struct Poller {
    source: Arc<dyn AddressSource>,
    updater: Arc<dyn Updater>,
    interval: Duration,
    ipv4: bool,
    ipv6: bool,
    host_suffix: Option<Ipv6Addr>,

    last_v4: Option<Ipv4Addr>,
    last_v6: Option<Ipv6Addr>,
}

impl Poller {
    /// Create a poller that polls both families every `interval`
    ///
    /// A zero interval falls back to [`DEFAULT_POLL_INTERVAL`].
    pub fn new(
        source: Arc<dyn AddressSource>,
        updater: Arc<dyn Updater>,
        interval: Duration,
    ) -> Self {
        let interval = if interval.is_zero() {
            warn!(default = ?DEFAULT_POLL_INTERVAL, "Poll interval is zero, using default");
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };

        Self {
            source,
            updater,
            interval,
            ipv4: true,
            ipv6: true,
            host_suffix: None,
            last_v4: None,
            last_v6: None,
        }
    }

    /// Time between polls
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Select which families are polled
    pub fn with_families(mut self, ipv4: bool, ipv6: bool) -> Self {
        self.ipv4 = ipv4;
        self.ipv6 = ipv6;
        self
    }

    /// Build IPv6 addresses from the delegated prefix and this host suffix
    pub fn with_host_suffix(mut self, suffix: Option<Ipv6Addr>) -> Self {
        self.host_suffix = suffix;
        self
    }

    /// Poll immediately, then on every tick, forever
    pub async fn run(mut self) {
        info!(
            source = self.source.source_name(),
            interval = ?self.interval,
            ipv4 = self.ipv4,
            ipv6 = self.ipv6,
            prefix_mode = self.host_suffix.is_some(),
            "Starting router polling"
        );

        let mut ticks = IntervalStream::new(tick_interval(self.interval));
        while ticks.next().await.is_some() {
            self.poll_once().await;
        }
    }

    /// Run one poll cycle
    pub async fn poll_once(&mut self) {
        debug!("Polling WAN IPs from router");

        if self.ipv4 {
            self.poll_ipv4().await;
        }

        if self.ipv6 {
            match self.host_suffix {
                Some(suffix) => self.poll_ipv6_prefix(suffix).await,
                None => self.poll_ipv6().await,
            }
        }
    }

    async fn poll_ipv4(&mut self) {
        match self.source.wan_ipv4().await {
            Ok(ipv4) => {
                // Always forwarded; the updater drops repeats itself.
                self.updater.on_new_ip(IpAddr::V4(ipv4)).await;
                if self.last_v4 != Some(ipv4) {
                    info!(%ipv4, "New WAN IPv4 found");
                    self.last_v4 = Some(ipv4);
                }
            }
            Err(e) => warn!(error = %e, "Failed to poll WAN IPv4 from router"),
        }
    }

    async fn poll_ipv6(&mut self) {
        match self.source.wan_ipv6().await {
            Ok(ipv6) => {
                if self.last_v6 != Some(ipv6) {
                    info!(%ipv6, "New WAN IPv6 found");
                    self.updater.on_new_ip(IpAddr::V6(ipv6)).await;
                    self.last_v6 = Some(ipv6);
                }
            }
            Err(e) => warn!(error = %e, "Failed to poll WAN IPv6 from router"),
        }
    }

    async fn poll_ipv6_prefix(&mut self, suffix: Ipv6Addr) {
        match self.source.ipv6_prefix().await {
            Ok(delegated) => {
                let ipv6 = prefix::address_in(&delegated, suffix);
                if self.last_v6 != Some(delegated.network) {
                    info!(prefix = %delegated, %ipv6, "New IPv6 prefix found");
                    self.last_v6 = Some(delegated.network);
                }
                self.updater.on_new_ip(IpAddr::V6(ipv6)).await;
            }
            Err(e) => warn!(error = %e, "Failed to poll IPv6 prefix from router"),
        }
    }
}

/// Ticker for the poll loop
///
/// The first tick completes immediately. Ticks missed while a slow poll was
/// running are dropped instead of being fired back to back.
fn tick_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}
