// # dyndns-core
//
// Update propagation engine for the dynamic DNS synchronizer.
//
// ## Architecture Overview
//
// This library keeps a set of DNS records pointed at the current public
// addresses of a network whose addresses change over time:
// - **AddressSource**: Trait for asking the router about its WAN addresses
// - **DnsProvider**: Trait for listing, creating and updating provider records
// - **Updater**: The ingress every producer hands new addresses to
// - **ProviderUpdater**: Queue + single worker reconciling records against the provider
// - **Poller**: Periodic router polling, including IPv6 prefix + host suffix addressing
//
// ## Design Principles
//
// 1. **Serialized delivery**: One worker drains a bounded FIFO queue, so
//    notification bursts never race each other at the provider
// 2. **Provider is the source of truth**: Records are listed fresh on every
//    pass; only the last processed address per family is remembered
// 3. **Backpressure, not loss**: A full queue makes producers wait
// 4. **Explicit failure policy**: Fatal reconciliation errors surface to the
//    owner of the worker instead of ending the process inline
// 5. **Library-First**: The daemon is thin wiring around this crate

pub mod config;
pub mod engine;
pub mod error;
pub mod poller;
pub mod prefix;
pub mod traits;
pub mod updater;

// Re-export core types for convenience
pub use config::{FailurePolicy, RetryPolicy, UpdaterConfig};
pub use engine::{Action, DomainExtractor, ProviderUpdater, WorkerHandle};
pub use error::{Error, Result};
pub use poller::Poller;
pub use traits::{AddressSource, DelegatedPrefix, DnsProvider, IpVersion, RecordType, RemoteRecord};
pub use updater::{NoopUpdater, Updater};
