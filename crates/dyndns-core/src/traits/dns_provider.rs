// # DNS Provider Trait
//
// Defines the interface for reading and writing DNS records via provider APIs.
//
// ## Implementations
//
// - Cloudflare: `dyndns-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::{DnsProvider, RecordType};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let zone = provider.resolve_zone_id("example.com").await?;
//     let records = provider
//         .list_records(&zone, RecordType::A, "home.example.com")
//         .await?;
//
//     if records.is_empty() {
//         provider
//             .create_record(&zone, RecordType::A, "home.example.com", "203.0.113.5", 120, false)
//             .await?;
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::IpVersion;

/// DNS record type managed by the synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    #[allow(clippy::upper_case_acronyms)]
    AAAA,
}

impl RecordType {
    /// Record type that carries addresses of the given family
    pub fn for_version(version: IpVersion) -> Self {
        match version {
            IpVersion::V4 => RecordType::A,
            IpVersion::V6 => RecordType::AAAA,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DNS record as reported by the provider
///
/// Fetched fresh for every reconciliation pass and never cached: the
/// provider is the source of truth for the record's current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    /// The record ID (provider-specific)
    pub id: String,
    /// The record content (the address, as text)
    pub content: String,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Whether traffic is proxied through the provider
    pub proxied: bool,
    /// Record type
    pub record_type: RecordType,
}

/// Trait for DNS provider implementations
///
/// Each method is a single API operation. Providers do not decide whether
/// a record needs to change; the reconciliation worker compares the listed
/// records with the new address and issues the writes.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Partial updates
///
/// Some provider APIs reset fields that are missing from an update to
/// their defaults. [`DnsProvider::update_record`] therefore always carries
/// TTL and proxied flag, and callers echo back the values they listed.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up the zone identifier for a registrable domain
    ///
    /// # Parameters
    ///
    /// - `domain`: The registrable domain (e.g., "example.com", "example.co.uk")
    async fn resolve_zone_id(&self, domain: &str) -> Result<String, crate::Error>;

    /// List all records in `zone_id` with the given type and exact name
    ///
    /// An empty list is not an error.
    async fn list_records(
        &self,
        zone_id: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<Vec<RemoteRecord>, crate::Error>;

    /// Create a record and return its provider-assigned ID
    async fn create_record(
        &self,
        zone_id: &str,
        record_type: RecordType,
        name: &str,
        content: &str,
        ttl: u32,
        proxied: bool,
    ) -> Result<String, crate::Error>;

    /// Replace the content of an existing record
    ///
    /// `ttl` and `proxied` are always submitted, even when unchanged.
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        content: &str,
        ttl: u32,
        proxied: bool,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
