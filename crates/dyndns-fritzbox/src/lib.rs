// # FRITZ!Box Address Source
//
// This crate asks an AVM FRITZ!Box for its WAN addresses over the UPnP/IGD
// SOAP interface (TR-064 is not needed; the IGD service is unauthenticated).
//
// ## Actions
//
// All requests go to `{base}/igdupnp/control/WANIPConn1`, service
// `urn:schemas-upnp-org:service:WANIPConnection:1`:
//
// - `GetExternalIPAddress` → `NewExternalIPAddress`
// - `X_AVM_DE_GetExternalIPv6Address` → `NewExternalIPv6Address`
// - `X_AVM_DE_GetIPv6Prefix` → `NewIPv6Prefix`, `NewPrefixLength`
//
// The router answers with an unspecified address (`0.0.0.0` / `::`) while
// the uplink is down; that is reported as an error, not as an address.

use async_trait::async_trait;
use dyndns_core::traits::{AddressSource, DelegatedPrefix};
use dyndns_core::{Error, Result};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use tracing::debug;

/// Default router endpoint
pub const DEFAULT_URL: &str = "http://fritz.box:49000";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const CONTROL_PATH: &str = "/igdupnp/control/WANIPConn1";
const SERVICE: &str = "urn:schemas-upnp-org:service:WANIPConnection:1";

/// FRITZ!Box UPnP client
#[derive(Debug)]
pub struct FritzBox {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl FritzBox {
    /// Create a client for the router at `url` (e.g. `http://fritz.box:49000`)
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into().trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    /// Router base URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invoke a SOAP action and return the raw response body
    async fn call(&self, action: &str) -> Result<String> {
        debug!(action, url = %self.url, "Calling FRITZ!Box SOAP action");

        let response = self
            .client
            .post(format!("{}{}", self.url, CONTROL_PATH))
            .header("Content-Type", "text/xml; charset=\"utf-8\"")
            .header("SoapAction", format!("{}#{}", SERVICE, action))
            .body(soap_envelope(action))
            .send()
            .await
            .map_err(|e| Error::address_source(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::address_source(format!(
                "{} returned HTTP {}",
                action, status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Error::address_source(format!("Failed to read {} response: {}", action, e)))
    }
}

fn soap_envelope(action: &str) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
            "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" ",
            "s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">",
            "<s:Body><u:{action} xmlns:u=\"{service}\" /></s:Body>",
            "</s:Envelope>"
        ),
        action = action,
        service = SERVICE
    )
}

/// Text content of the first `<tag>` element in `body`
fn extract_tag<'a>(body: &'a str, tag: &str) -> Result<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = body
        .find(&open)
        .map(|i| i + open.len())
        .ok_or_else(|| Error::address_source(format!("Response has no <{}> element", tag)))?;
    let len = body[start..]
        .find(&close)
        .ok_or_else(|| Error::address_source(format!("Unterminated <{}> element", tag)))?;

    Ok(body[start..start + len].trim())
}

fn parse_ipv4(body: &str) -> Result<Ipv4Addr> {
    let text = extract_tag(body, "NewExternalIPAddress")?;
    let ip: Ipv4Addr = text
        .parse()
        .map_err(|_| Error::address_source(format!("Invalid IPv4 address: '{}'", text)))?;
    if ip.is_unspecified() {
        return Err(Error::address_source("Router reports no WAN IPv4 address"));
    }
    Ok(ip)
}

fn parse_ipv6(body: &str) -> Result<Ipv6Addr> {
    let text = extract_tag(body, "NewExternalIPv6Address")?;
    let ip: Ipv6Addr = text
        .parse()
        .map_err(|_| Error::address_source(format!("Invalid IPv6 address: '{}'", text)))?;
    if ip.is_unspecified() {
        return Err(Error::address_source("Router reports no WAN IPv6 address"));
    }
    Ok(ip)
}

fn parse_prefix(body: &str) -> Result<DelegatedPrefix> {
    let text = extract_tag(body, "NewIPv6Prefix")?;
    let network: Ipv6Addr = text
        .parse()
        .map_err(|_| Error::address_source(format!("Invalid IPv6 prefix: '{}'", text)))?;
    if network.is_unspecified() {
        return Err(Error::address_source("Router reports no IPv6 prefix"));
    }

    let length_text = extract_tag(body, "NewPrefixLength")?;
    let length: u8 = length_text
        .parse()
        .ok()
        .filter(|l| *l <= 128)
        .ok_or_else(|| {
            Error::address_source(format!("Invalid IPv6 prefix length: '{}'", length_text))
        })?;

    Ok(DelegatedPrefix::new(network, length))
}

#[async_trait]
impl AddressSource for FritzBox {
    async fn wan_ipv4(&self) -> Result<Ipv4Addr> {
        parse_ipv4(&self.call("GetExternalIPAddress").await?)
    }

    async fn wan_ipv6(&self) -> Result<Ipv6Addr> {
        parse_ipv6(&self.call("X_AVM_DE_GetExternalIPv6Address").await?)
    }

    async fn ipv6_prefix(&self) -> Result<DelegatedPrefix> {
        parse_prefix(&self.call("X_AVM_DE_GetIPv6Prefix").await?)
    }

    fn source_name(&self) -> &'static str {
        "fritzbox"
    }
}
