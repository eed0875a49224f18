//! Test doubles and common utilities for engine contract tests
//!
//! The mock provider keeps an in-memory zone so that records created by one
//! pass are listed by the next, and records every call it receives.

#![allow(dead_code)]

use dyndns_core::engine::DomainExtractor;
use dyndns_core::error::{Error, Result};
use dyndns_core::traits::{AddressSource, DelegatedPrefix, DnsProvider, RecordType, RemoteRecord};
use dyndns_core::{ProviderUpdater, Updater, UpdaterConfig, WorkerHandle};
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

/// One call received by [`MockDnsProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    ResolveZone {
        domain: String,
    },
    List {
        zone_id: String,
        record_type: RecordType,
        name: String,
    },
    Create {
        zone_id: String,
        record_type: RecordType,
        name: String,
        content: String,
        ttl: u32,
        proxied: bool,
    },
    Update {
        zone_id: String,
        record_id: String,
        content: String,
        ttl: u32,
        proxied: bool,
    },
}

/// Provider operation that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ResolveZone,
    List,
    Create,
    Update,
}

#[derive(Default)]
struct ZoneState {
    zones: HashMap<String, String>,
    records: Vec<(String, String, RemoteRecord)>,
    calls: Vec<ProviderCall>,
    failures: HashMap<Op, String>,
    next_id: usize,
}

/// Holds list calls until released
#[derive(Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
    entered: Arc<Notify>,
}

impl Gate {
    fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
            entered: Arc::new(Notify::new()),
        }
    }

    /// Wait until a list call is parked at the gate
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let `n` list calls through
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }
}

/// A mock DnsProvider backed by an in-memory zone
#[derive(Clone)]
pub struct MockDnsProvider {
    state: Arc<Mutex<ZoneState>>,
    gate: Option<Gate>,
    pub name: &'static str,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ZoneState::default())),
            gate: None,
            name: "mock",
        }
    }

    /// Register a zone for a registrable domain
    pub fn with_zone(self, domain: &str, zone_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .zones
            .insert(domain.to_string(), zone_id.to_string());
        self
    }

    /// Seed an existing record
    pub fn with_record(self, zone_id: &str, name: &str, record: RemoteRecord) -> Self {
        self.state
            .lock()
            .unwrap()
            .records
            .push((zone_id.to_string(), name.to_string(), record));
        self
    }

    /// Make every call of `op` fail
    pub fn failing_on(self, op: Op) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(op, format!("injected {:?} failure", op));
        self
    }

    /// Park every list call until the returned gate releases it
    pub fn gated(mut self) -> (Self, Gate) {
        let gate = Gate::new();
        self.gate = Some(gate.clone());
        (self, gate)
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls other than zone lookups
    pub fn record_calls(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, ProviderCall::ResolveZone { .. }))
            .collect()
    }

    pub fn creates(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ProviderCall::Create { .. }))
            .collect()
    }

    pub fn updates(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ProviderCall::Update { .. }))
            .collect()
    }

    pub fn lists(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ProviderCall::List { .. }))
            .collect()
    }

    /// Current records of the given type and name, across zones
    pub fn records(&self, record_type: RecordType, name: &str) -> Vec<RemoteRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|(_, n, r)| n == name && r.record_type == record_type)
            .map(|(_, _, r)| r.clone())
            .collect()
    }

    fn check_failure(&self, op: Op) -> Result<()> {
        match self.state.lock().unwrap().failures.get(&op) {
            Some(msg) => Err(Error::provider(self.name, msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn resolve_zone_id(&self, domain: &str) -> Result<String> {
        {
            let mut state = self.state.lock().unwrap();
            state.calls.push(ProviderCall::ResolveZone {
                domain: domain.to_string(),
            });
        }
        self.check_failure(Op::ResolveZone)?;

        self.state
            .lock()
            .unwrap()
            .zones
            .get(domain)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", domain)))
    }

    async fn list_records(
        &self,
        zone_id: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<Vec<RemoteRecord>> {
        self.state.lock().unwrap().calls.push(ProviderCall::List {
            zone_id: zone_id.to_string(),
            record_type,
            name: name.to_string(),
        });

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.permits
                .acquire()
                .await
                .expect("gate semaphore is never closed")
                .forget();
        }

        self.check_failure(Op::List)?;

        Ok(self
            .state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|(z, n, r)| z == zone_id && n == name && r.record_type == record_type)
            .map(|(_, _, r)| r.clone())
            .collect())
    }

    async fn create_record(
        &self,
        zone_id: &str,
        record_type: RecordType,
        name: &str,
        content: &str,
        ttl: u32,
        proxied: bool,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Create {
            zone_id: zone_id.to_string(),
            record_type,
            name: name.to_string(),
            content: content.to_string(),
            ttl,
            proxied,
        });

        if let Some(msg) = state.failures.get(&Op::Create) {
            return Err(Error::provider(self.name, msg.clone()));
        }

        state.next_id += 1;
        let id = format!("created-{}", state.next_id);
        state.records.push((
            zone_id.to_string(),
            name.to_string(),
            RemoteRecord {
                id: id.clone(),
                content: content.to_string(),
                ttl,
                proxied,
                record_type,
            },
        ));
        Ok(id)
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        content: &str,
        ttl: u32,
        proxied: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Update {
            zone_id: zone_id.to_string(),
            record_id: record_id.to_string(),
            content: content.to_string(),
            ttl,
            proxied,
        });

        if let Some(msg) = state.failures.get(&Op::Update) {
            return Err(Error::provider(self.name, msg.clone()));
        }

        let record = state
            .records
            .iter_mut()
            .find(|(z, _, r)| z == zone_id && r.id == record_id)
            .map(|(_, _, r)| r)
            .ok_or_else(|| Error::not_found(format!("Record not found: {}", record_id)))?;

        record.content = content.to_string();
        record.ttl = ttl;
        record.proxied = proxied;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// Registrable domain = last two labels (good enough for example.com names)
pub struct LastTwoLabels;

impl DomainExtractor for LastTwoLabels {
    fn registrable_domain(&self, name: &str) -> Result<String> {
        let labels: Vec<&str> = name.split('.').collect();
        if labels.len() < 2 {
            return Err(Error::zone_resolution(name, "no registrable domain"));
        }
        Ok(labels[labels.len() - 2..].join("."))
    }
}

/// Registrable domain = longest listed suffix plus one label
///
/// Mirrors a public suffix list that includes private entries such as
/// `eu.org`. Wildcard labels and a trailing dot are ignored.
pub struct ListedSuffixes(pub &'static [&'static str]);

impl DomainExtractor for ListedSuffixes {
    fn registrable_domain(&self, name: &str) -> Result<String> {
        let host = name.trim_end_matches('.');
        let host = host.strip_prefix("*.").unwrap_or(host);
        let labels: Vec<&str> = host.split('.').collect();

        for take in (1..labels.len()).rev() {
            let suffix = labels[labels.len() - take..].join(".");
            if self.0.contains(&suffix.as_str()) {
                return Ok(labels[labels.len() - take - 1..].join("."));
            }
        }
        Err(Error::zone_resolution(name, "no registrable domain"))
    }
}

/// An AddressSource that replays scripted answers
///
/// Once a script runs dry, the method keeps failing.
#[derive(Default)]
pub struct ScriptedAddressSource {
    ipv4: Mutex<VecDeque<Result<Ipv4Addr>>>,
    ipv6: Mutex<VecDeque<Result<Ipv6Addr>>>,
    prefixes: Mutex<VecDeque<Result<DelegatedPrefix>>>,
}

impl ScriptedAddressSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ipv4(&self, answer: Result<Ipv4Addr>) {
        self.ipv4.lock().unwrap().push_back(answer);
    }

    pub fn push_ipv6(&self, answer: Result<Ipv6Addr>) {
        self.ipv6.lock().unwrap().push_back(answer);
    }

    pub fn push_prefix(&self, answer: Result<DelegatedPrefix>) {
        self.prefixes.lock().unwrap().push_back(answer);
    }
}

fn next<T>(script: &Mutex<VecDeque<Result<T>>>) -> Result<T> {
    script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(Error::address_source("script exhausted")))
}

#[async_trait::async_trait]
impl AddressSource for ScriptedAddressSource {
    async fn wan_ipv4(&self) -> Result<Ipv4Addr> {
        next(&self.ipv4)
    }

    async fn wan_ipv6(&self) -> Result<Ipv6Addr> {
        next(&self.ipv6)
    }

    async fn ipv6_prefix(&self) -> Result<DelegatedPrefix> {
        next(&self.prefixes)
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// An Updater that records what it receives
#[derive(Default)]
pub struct RecordingUpdater {
    received: Mutex<Vec<IpAddr>>,
}

impl RecordingUpdater {
    pub fn received(&self) -> Vec<IpAddr> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Updater for RecordingUpdater {
    async fn on_new_ip(&self, ip: IpAddr) {
        self.received.lock().unwrap().push(ip);
    }
}

/// Build a remote record
pub fn remote(id: &str, record_type: RecordType, content: &str, ttl: u32, proxied: bool) -> RemoteRecord {
    RemoteRecord {
        id: id.to_string(),
        content: content.to_string(),
        ttl,
        proxied,
        record_type,
    }
}

/// Config with the given records and default engine settings
pub fn config(ipv4: &[&str], ipv6: &[&str]) -> UpdaterConfig {
    UpdaterConfig::new(
        ipv4.iter().map(|s| s.to_string()).collect(),
        ipv6.iter().map(|s| s.to_string()).collect(),
    )
}

/// Start a provider updater over the mock
pub async fn start(provider: &MockDnsProvider, config: UpdaterConfig) -> (ProviderUpdater, WorkerHandle) {
    ProviderUpdater::start(Arc::new(provider.clone()), &LastTwoLabels, config)
        .await
        .expect("updater starts")
}

/// Feed `ips` through a fresh updater and wait until all are processed
pub async fn run_to_completion(
    provider: &MockDnsProvider,
    config: UpdaterConfig,
    ips: &[IpAddr],
) -> Result<()> {
    let (updater, worker) = start(provider, config).await;
    for ip in ips {
        updater.on_new_ip(*ip).await;
    }
    drop(updater);

    tokio::time::timeout(Duration::from_secs(5), worker.wait())
        .await
        .expect("worker drains the queue")
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}
