//! Contract Test: Router Polling
//!
//! This test verifies what the poll loop forwards to the updater.
//!
//! Constraints verified:
//! - Every successfully polled IPv4 address is forwarded
//! - WAN IPv6 addresses are forwarded only when they change
//! - With a host suffix, the address is built from the delegated prefix
//! - Polling errors are skipped without affecting the other family
//!
//! If this test fails, the engine is fed wrong or missing addresses.

mod common;

use common::*;
use dyndns_core::{DelegatedPrefix, Error, Poller};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

fn v4(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

fn v6(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

#[tokio::test]
async fn ipv4_is_forwarded_on_every_poll() {
    let source = Arc::new(ScriptedAddressSource::new());
    source.push_ipv4(Ok(v4("203.0.113.5")));
    source.push_ipv4(Ok(v4("203.0.113.5")));
    let updater = Arc::new(RecordingUpdater::default());

    let mut poller = Poller::new(source.clone(), updater.clone(), Duration::from_secs(60))
        .with_families(true, false);
    poller.poll_once().await;
    poller.poll_once().await;

    assert_eq!(updater.received(), vec![ip("203.0.113.5"), ip("203.0.113.5")]);
}

#[tokio::test]
async fn wan_ipv6_is_forwarded_only_on_change() {
    let source = Arc::new(ScriptedAddressSource::new());
    source.push_ipv6(Ok(v6("2001:db8::1")));
    source.push_ipv6(Ok(v6("2001:db8::1")));
    source.push_ipv6(Ok(v6("2001:db8::2")));
    let updater = Arc::new(RecordingUpdater::default());

    let mut poller = Poller::new(source.clone(), updater.clone(), Duration::from_secs(60))
        .with_families(false, true);
    for _ in 0..3 {
        poller.poll_once().await;
    }

    assert_eq!(updater.received(), vec![ip("2001:db8::1"), ip("2001:db8::2")]);
}

#[tokio::test]
async fn host_suffix_combines_with_delegated_prefix() {
    let source = Arc::new(ScriptedAddressSource::new());
    source.push_prefix(Ok(DelegatedPrefix::new(v6("2001:db8:1:2::"), 64)));
    source.push_prefix(Ok(DelegatedPrefix::new(v6("2001:db8:9:8::"), 64)));
    let updater = Arc::new(RecordingUpdater::default());

    let mut poller = Poller::new(source.clone(), updater.clone(), Duration::from_secs(60))
        .with_families(false, true)
        .with_host_suffix(Some(v6("fe80::1234:56ff:fe78:9abc")));
    poller.poll_once().await;
    poller.poll_once().await;

    assert_eq!(
        updater.received(),
        vec![
            ip("2001:db8:1:2:1234:56ff:fe78:9abc"),
            ip("2001:db8:9:8:1234:56ff:fe78:9abc"),
        ]
    );
}

#[tokio::test]
async fn polling_errors_are_skipped_per_family() {
    let source = Arc::new(ScriptedAddressSource::new());
    source.push_ipv4(Err(Error::address_source("router unreachable")));
    source.push_ipv4(Ok(v4("203.0.113.5")));
    source.push_ipv6(Ok(v6("2001:db8::1")));
    source.push_ipv6(Err(Error::address_source("no IPv6 uplink")));
    let updater = Arc::new(RecordingUpdater::default());

    let mut poller = Poller::new(source.clone(), updater.clone(), Duration::from_secs(60));
    poller.poll_once().await;
    poller.poll_once().await;

    assert_eq!(updater.received(), vec![ip("2001:db8::1"), ip("203.0.113.5")]);
}

#[tokio::test]
async fn run_polls_immediately_and_feeds_the_engine() {
    let source = Arc::new(ScriptedAddressSource::new());
    source.push_ipv4(Ok(v4("203.0.113.5")));
    let provider = MockDnsProvider::new().with_zone("example.com", "zone-1");
    let (updater, _worker) = start(&provider, config(&["home.example.com"], &[])).await;

    let poller = Poller::new(source.clone(), Arc::new(updater), Duration::from_secs(3600))
        .with_families(true, false);
    let handle = tokio::spawn(poller.run());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while provider.creates().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "record was never created");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.abort();

    assert_eq!(provider.records(dyndns_core::RecordType::A, "home.example.com").len(), 1);
}

#[tokio::test]
async fn zero_interval_falls_back_to_default() {
    let source = Arc::new(ScriptedAddressSource::new());
    let updater = Arc::new(RecordingUpdater::default());

    let poller = Poller::new(source, updater, Duration::ZERO);
    assert_eq!(poller.interval(), dyndns_core::poller::DEFAULT_POLL_INTERVAL);

    let source = Arc::new(ScriptedAddressSource::new());
    let updater = Arc::new(RecordingUpdater::default());
    let poller = Poller::new(source, updater, Duration::from_secs(30));
    assert_eq!(poller.interval(), Duration::from_secs(30));
}
