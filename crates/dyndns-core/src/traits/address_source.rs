// # Address Source Trait
//
// Defines the interface for learning the current WAN addresses of the
// local network, typically by asking the home router.
//
// ## Implementations
//
// - FRITZ!Box (UPnP/IGD SOAP): `dyndns-fritzbox` crate
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::AddressSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* AddressSource implementation */;
//
//     let v4 = source.wan_ipv4().await?;
//     let prefix = source.ipv6_prefix().await?;
//     println!("{v4} {}/{}", prefix.network, prefix.length);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Family of an address, by structure
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) count as IPv4.
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(v6) if v6.to_ipv4_mapped().is_some() => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => f.write_str("IPv4"),
            IpVersion::V6 => f.write_str("IPv6"),
        }
    }
}

/// An IPv6 block delegated to the LAN by the upstream router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegatedPrefix {
    /// Network address; bits beyond `length` are expected to be zero
    pub network: Ipv6Addr,
    /// Number of leading network bits (0-128)
    pub length: u8,
}

impl DelegatedPrefix {
    pub fn new(network: Ipv6Addr, length: u8) -> Self {
        Self { network, length }
    }
}

impl fmt::Display for DelegatedPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.length)
    }
}

/// Trait for address source implementations
///
/// Each method performs one request against the router and returns
/// what it reported. Sources do not remember previous answers and do not
/// decide whether anything changed; that is the poller's and the
/// engine's job.
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Current public IPv4 address of the WAN interface
    async fn wan_ipv4(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Current public IPv6 address of the router's WAN interface
    async fn wan_ipv6(&self) -> Result<Ipv6Addr, crate::Error>;

    /// IPv6 prefix currently delegated to the LAN
    async fn ipv6_prefix(&self) -> Result<DelegatedPrefix, crate::Error>;

    /// Name used in log output
    fn source_name(&self) -> &'static str;
}
