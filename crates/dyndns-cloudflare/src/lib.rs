// # Cloudflare DNS Provider
//
// This crate implements the `DnsProvider` trait against the Cloudflare API v4.
//
// The provider only speaks HTTP. Deciding which records to touch, and when,
// is the engine's job; this crate turns each trait call into one API
// request (plus retries for transient failures).
//
// ## Security Requirements
//
// - Credentials NEVER appear in logs or Debug output
// - Empty credentials are rejected at construction time
//
// ## API Reference
//
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=...&name=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Patch DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use dyndns_core::traits::{DnsProvider, RecordType, RemoteRecord};
use dyndns_core::{Error, Result, RetryPolicy};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "cloudflare";

/// How requests are authenticated
#[derive(Clone)]
pub enum Credentials {
    /// Scoped API token, sent as a bearer token
    Token(String),
    /// Legacy account email plus global API key
    Key { email: String, key: String },
}

impl Credentials {
    fn validate(&self) -> Result<()> {
        match self {
            Self::Token(token) if token.trim().is_empty() => {
                Err(Error::config("Cloudflare API token cannot be empty"))
            }
            Self::Key { email, key } if email.trim().is_empty() || key.trim().is_empty() => Err(
                Error::config("Cloudflare API email and key must both be set"),
            ),
            _ => Ok(()),
        }
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Token(token) => request.bearer_auth(token),
            Self::Key { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }
}

// Credentials are secret; only the kind is shown.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(<REDACTED>)"),
            Self::Key { .. } => f.write_str("Key(<REDACTED>)"),
        }
    }
}

/// Cloudflare DNS provider
///
/// Transient failures (rate limits, 5xx, transport errors) are retried
/// according to the configured [`RetryPolicy`]; everything else is
/// returned to the caller immediately.
pub struct CloudflareProvider {
    credentials: Credentials,
    base_url: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a provider talking to the public Cloudflare API
    ///
    /// Fails if the credentials are empty or the HTTP client cannot be built.
    pub fn new(credentials: Credentials) -> Result<Self> {
        credentials.validate()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            retry: RetryPolicy::default(),
            client,
        })
    }

    /// Point the provider at a different API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, retrying transient failures
    ///
    /// `build` is called once per attempt since a sent request cannot be reused.
    async fn send_with_retry<T, F>(&self, what: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match self.send_once(build()).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        provider = PROVIDER,
                        request = what,
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay = ?delay,
                        error = %e,
                        "Transient Cloudflare error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = self
            .credentials
            .apply(request)
            .send()
            .await
            .map_err(|e| Error::http(format!("Cloudflare request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read Cloudflare response: {}", e)))?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        decode_envelope(&body)
    }
}

/// The v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    #[serde(default)]
    ttl: u32,
    #[serde(default)]
    proxied: bool,
}

#[derive(Debug, Serialize)]
struct NewRecord<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

#[derive(Debug, Serialize)]
struct RecordPatch<'a> {
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

fn join_messages(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} ({})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;

    if !envelope.success {
        return Err(Error::provider(PROVIDER, join_messages(&envelope.errors)));
    }

    envelope
        .result
        .ok_or_else(|| Error::provider(PROVIDER, "Response has no result"))
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, body: &str) -> Error {
    let detail = serde_json::from_str::<Envelope<serde_json::Value>>(body)
        .map(|e| join_messages(&e.errors))
        .unwrap_or_else(|_| body.chars().take(200).collect());

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid Cloudflare credentials or insufficient permissions ({}): {}",
            status, detail
        )),
        404 => Error::not_found(format!("Cloudflare resource not found: {}", detail)),
        429 => Error::rate_limited(format!("Cloudflare rate limit exceeded: {}", detail)),
        500..=599 => Error::http(format!("Cloudflare server error {}: {}", status, detail)),
        _ => Error::provider(PROVIDER, format!("Unexpected status {}: {}", status, detail)),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn resolve_zone_id(&self, domain: &str) -> Result<String> {
        debug!(provider = PROVIDER, domain, "Looking up zone ID");

        let url = self.url("/zones");
        let zones: Vec<Zone> = self
            .send_with_retry("list zones", || {
                self.client.get(&url).query(&[("name", domain)])
            })
            .await?;

        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", domain)))?;

        debug!(provider = PROVIDER, domain, zone_id = %zone.id, "Found zone ID");
        Ok(zone.id)
    }

    async fn list_records(
        &self,
        zone_id: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<Vec<RemoteRecord>> {
        let url = self.url(&format!("/zones/{}/dns_records", zone_id));
        let records: Vec<DnsRecord> = self
            .send_with_retry("list records", || {
                self.client
                    .get(&url)
                    .query(&[("type", record_type.as_str()), ("name", name)])
            })
            .await?;

        debug!(
            provider = PROVIDER,
            zone_id,
            record = name,
            %record_type,
            count = records.len(),
            "Listed DNS records"
        );

        Ok(records
            .into_iter()
            .filter(|r| r.record_type == record_type.as_str())
            .map(|r| RemoteRecord {
                id: r.id,
                content: r.content,
                ttl: r.ttl,
                proxied: r.proxied,
                record_type,
            })
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
        let url = self.url(&format!("/zones/{}/dns_records", zone_id));
        let body = NewRecord {
            record_type: record_type.as_str(),
            name,
            content,
            ttl,
            proxied,
        };

        let created: DnsRecord = self
            .send_with_retry("create record", || self.client.post(&url).json(&body))
            .await?;

        info!(
            provider = PROVIDER,
            record = name,
            %record_type,
            content,
            record_id = %created.id,
            "Created DNS record"
        );
        Ok(created.id)
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        content: &str,
        ttl: u32,
        proxied: bool,
    ) -> Result<()> {
        let url = self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id));
        let body = RecordPatch {
            content,
            ttl,
            proxied,
        };

        let updated: DnsRecord = self
            .send_with_retry("update record", || self.client.patch(&url).json(&body))
            .await?;

        info!(
            provider = PROVIDER,
            record_id,
            content = %updated.content,
            "Updated DNS record"
        );
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
