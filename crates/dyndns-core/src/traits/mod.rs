//! Core traits for the dynamic DNS synchronizer
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressSource`]: Poll the router for the current WAN addresses
//! - [`DnsProvider`]: Look up, create and update DNS records via provider APIs

pub mod address_source;
pub mod dns_provider;

pub use address_source::{AddressSource, DelegatedPrefix, IpVersion};
pub use dns_provider::{DnsProvider, RecordType, RemoteRecord};
