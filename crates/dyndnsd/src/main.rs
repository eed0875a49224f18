// # dyndnsd - Dynamic DNS Daemon
//
// Thin integration layer: reads the environment, builds the updater and the
// router poller from the library crates, and waits for a shutdown signal.
// All synchronization logic lives in dyndns-core.
//
// ## Configuration
//
// All configuration is done via environment variables. `.env` and then
// `.env.dev` in the working directory are loaded first if present; they
// never override variables that are already set.
//
// ### Records
// - `CLOUDFLARE_ZONES_IPV4`: Comma-separated A records to keep updated
// - `CLOUDFLARE_ZONES_IPV6`: Comma-separated AAAA records to keep updated
//
// ### Updater
// - `UPDATER`: `noop` to only log addresses (no credentials needed)
// - `CLOUDFLARE_API_TOKEN`: Scoped API token
// - `CLOUDFLARE_API_EMAIL` / `CLOUDFLARE_API_KEY`: Deprecated global key
// - `CLOUDFLARE_RETRY_POLICY`: `"<max retries> <min delay> <max delay>"` (seconds)
// - `DYNDNS_FAILURE_POLICY`: `exit` (default) or `continue`
//
// ### Router polling
// - `FRITZBOX_ENDPOINT_URL`: Router base URL, e.g. `http://fritz.box:49000`
// - `FRITZBOX_ENDPOINT_TIMEOUT`: Request timeout, e.g. `10s`
// - `FRITZBOX_ENDPOINT_INTERVAL`: Poll interval, e.g. `5m`
// - `DEVICE_LOCAL_ADDRESS_IPV6`: Build the IPv6 address from the delegated
//   prefix and this host's address instead of using the router's WAN address
//
// ### Logging
// - `LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export CLOUDFLARE_ZONES_IPV4=home.example.com
// export CLOUDFLARE_ZONES_IPV6=home.example.com,nas.example.com
// export CLOUDFLARE_API_TOKEN=your_token
// export FRITZBOX_ENDPOINT_URL=http://fritz.box:49000
// export FRITZBOX_ENDPOINT_INTERVAL=5m
//
// dyndnsd
// ```

use anyhow::{Context, Result};
use dyndns_core::{FailurePolicy, NoopUpdater, RetryPolicy, Updater, UpdaterConfig, WorkerHandle};
use std::env;
use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DyndnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (fatal reconciliation failure)
    RuntimeError = 2,
}

impl From<DyndnsExitCode> for ExitCode {
    fn from(code: DyndnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Router request timeout when the configured one is unusable
const DEFAULT_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval when the configured one is unusable
const DEFAULT_POLL_INTERVAL: Duration = dyndns_core::poller::DEFAULT_POLL_INTERVAL;

/// Which updater receives the polled addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdaterKind {
    Noop,
    Cloudflare,
}

/// Application configuration
#[derive(Debug)]
struct Config {
    ipv4_records: Vec<String>,
    ipv6_records: Vec<String>,
    updater: UpdaterKind,
    api_token: Option<String>,
    api_email: Option<String>,
    api_key: Option<String>,
    retry_policy: Option<RetryPolicy>,
    failure_policy: FailurePolicy,
    fritzbox_url: Option<String>,
    fritzbox_timeout: Duration,
    poll_interval: Option<Duration>,
    host_suffix: Option<Ipv6Addr>,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`; empty values count as unset
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let updater = match get("UPDATER") {
            Some(kind) if kind.eq_ignore_ascii_case("noop") => UpdaterKind::Noop,
            _ => UpdaterKind::Cloudflare,
        };

        let retry_policy = get("CLOUDFLARE_RETRY_POLICY")
            .map(|s| s.parse::<RetryPolicy>())
            .transpose()
            .context("Failed to parse CLOUDFLARE_RETRY_POLICY")?;

        let failure_policy = get("DYNDNS_FAILURE_POLICY")
            .map(|s| s.parse::<FailurePolicy>())
            .transpose()
            .context("Failed to parse DYNDNS_FAILURE_POLICY")?
            .unwrap_or_default();

        let fritzbox_timeout = match get("FRITZBOX_ENDPOINT_TIMEOUT") {
            Some(s) => parse_duration(&s).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to parse FRITZBOX_ENDPOINT_TIMEOUT, using defaults");
                DEFAULT_ENDPOINT_TIMEOUT
            }),
            None => DEFAULT_ENDPOINT_TIMEOUT,
        };

        let poll_interval = get("FRITZBOX_ENDPOINT_INTERVAL").map(|s| {
            parse_duration(&s).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to parse FRITZBOX_ENDPOINT_INTERVAL, using defaults");
                DEFAULT_POLL_INTERVAL
            })
        });

        let host_suffix = get("DEVICE_LOCAL_ADDRESS_IPV6")
            .map(|s| s.trim().parse::<Ipv6Addr>())
            .transpose()
            .context("Failed to parse IP from DEVICE_LOCAL_ADDRESS_IPV6")?;

        Ok(Self {
            ipv4_records: split_records(get("CLOUDFLARE_ZONES_IPV4")),
            ipv6_records: split_records(get("CLOUDFLARE_ZONES_IPV6")),
            updater,
            api_token: get("CLOUDFLARE_API_TOKEN"),
            api_email: get("CLOUDFLARE_API_EMAIL"),
            api_key: get("CLOUDFLARE_API_KEY"),
            retry_policy,
            failure_policy,
            fritzbox_url: get("FRITZBOX_ENDPOINT_URL").map(|u| u.trim_end_matches('/').to_string()),
            fritzbox_timeout,
            poll_interval,
            host_suffix,
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.ipv4_records.is_empty() && self.ipv6_records.is_empty() {
            anyhow::bail!(
                "CLOUDFLARE_ZONES_IPV4 and CLOUDFLARE_ZONES_IPV6 are both empty. \
                Set at least one, e.g.: export CLOUDFLARE_ZONES_IPV4=home.example.com"
            );
        }

        for record in self.ipv4_records.iter().chain(&self.ipv6_records) {
            validate_domain_name(record)?;
        }

        if self.updater == UpdaterKind::Cloudflare
            && self.api_token.is_none()
            && (self.api_email.is_none() || self.api_key.is_none())
        {
            anyhow::bail!(
                "No Cloudflare token or email & key pair was provided. \
                Set it via: export CLOUDFLARE_API_TOKEN=your_token"
            );
        }

        if let Some(url) = &self.fritzbox_url
            && !url.starts_with("http://")
            && !url.starts_with("https://")
        {
            anyhow::bail!(
                "FRITZBOX_ENDPOINT_URL must use HTTP or HTTPS scheme. Got: {}",
                url
            );
        }

        if self.poll_interval.is_some_and(|i| i.is_zero()) {
            anyhow::bail!("FRITZBOX_ENDPOINT_INTERVAL must be greater than zero");
        }

        Ok(())
    }

    fn updater_config(&self) -> UpdaterConfig {
        UpdaterConfig::new(self.ipv4_records.clone(), self.ipv6_records.clone())
            .with_failure_policy(self.failure_policy)
    }
}

fn split_records(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| {
            let s = s.trim();
            s.strip_suffix('.').unwrap_or(s).to_string()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Validate that a string is a valid record name
///
/// Basic RFC 1035 checks; catches typos, not every invalid name. A single
/// trailing dot and a leading `*` wildcard label are allowed.
fn validate_domain_name(record: &str) -> Result<()> {
    let domain = record.strip_suffix('.').unwrap_or(record);
    let domain = domain.strip_prefix("*.").unwrap_or(domain);

    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

/// Parse a duration such as `10s`, `500ms`, `5m` or `1h30m`
///
/// Fractional values (`1.5h`) are not accepted.
fn parse_duration(input: &str) -> Result<Duration> {
    humantime::parse_duration(input.trim())
        .with_context(|| format!("invalid duration '{}'", input))
}

/// Files loaded into the environment at startup, in order
const ENV_FILES: [&str; 2] = [".env", ".env.dev"];

/// Load `ENV_FILES` from `dir` into the process environment
///
/// Variables already set are kept, so the real environment wins over
/// `.env`, which wins over `.env.dev`. Missing files are skipped; other
/// failures are returned for logging once tracing is up.
fn load_env_files(dir: &Path) -> Vec<(PathBuf, dotenvy::Error)> {
    ENV_FILES
        .iter()
        .map(|name| dir.join(name))
        .filter_map(|path| match dotenvy::from_path(&path) {
            Err(e) if !e.not_found() => Some((path, e)),
            _ => None,
        })
        .collect()
}

fn log_level_from_env() -> Level {
    match env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn main() -> ExitCode {
    let env_file_errors = load_env_files(Path::new("."));

    // Initialize tracing first so configuration warnings are visible
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level_from_env())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    for (path, e) in &env_file_errors {
        warn!(path = %path.display(), error = %e, "Failed to load environment file");
    }

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DyndnsExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation error: {:#}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    info!("Starting dyndnsd daemon");
    info!(
        ipv4_records = config.ipv4_records.len(),
        ipv6_records = config.ipv6_records.len(),
        "Configuration loaded"
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DyndnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let (updater, worker) = match build_updater(&config).await {
            Ok(parts) => parts,
            Err(e) => {
                error!("Failed to initialize the updater: {:#}", e);
                return DyndnsExitCode::ConfigError;
            }
        };

        if let Err(e) = run_daemon(&config, updater, worker).await {
            error!("Daemon error: {:#}", e);
            DyndnsExitCode::RuntimeError
        } else {
            DyndnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Build the updater selected by the configuration
///
/// Only the provider-backed updater has a worker to supervise.
async fn build_updater(config: &Config) -> Result<(Arc<dyn Updater>, Option<WorkerHandle>)> {
    if config.updater == UpdaterKind::Noop {
        info!("Using the no-op updater; DNS records will not be changed");
        return Ok((Arc::new(NoopUpdater::new(config.updater_config())), None));
    }

    build_cloudflare_updater(config).await
}

#[cfg(feature = "cloudflare")]
async fn build_cloudflare_updater(
    config: &Config,
) -> Result<(Arc<dyn Updater>, Option<WorkerHandle>)> {
    use dyndns_cloudflare::{CloudflareProvider, Credentials};
    use dyndns_core::ProviderUpdater;
    use dyndns_core::engine::registrable_domain_extractor;

    let credentials = match (&config.api_token, &config.api_email, &config.api_key) {
        (Some(token), _, _) => Credentials::Token(token.clone()),
        (None, Some(email), Some(key)) => {
            warn!("Using deprecated credentials via the API key");
            Credentials::Key {
                email: email.clone(),
                key: key.clone(),
            }
        }
        _ => anyhow::bail!("No Cloudflare token or email & key pair was provided"),
    };

    let mut provider = CloudflareProvider::new(credentials)?;
    if let Some(retry) = config.retry_policy {
        provider = provider.with_retry_policy(retry);
    }

    let extractor = registrable_domain_extractor();
    let (updater, worker) =
        ProviderUpdater::start(Arc::new(provider), &extractor, config.updater_config()).await?;

    Ok((Arc::new(updater), Some(worker)))
}

#[cfg(not(feature = "cloudflare"))]
async fn build_cloudflare_updater(
    _config: &Config,
) -> Result<(Arc<dyn Updater>, Option<WorkerHandle>)> {
    anyhow::bail!("dyndnsd was built without Cloudflare support; set UPDATER=noop")
}

/// Spawn the router poller if polling is configured
#[cfg(feature = "fritzbox")]
fn spawn_poller(
    config: &Config,
    updater: Arc<dyn Updater>,
) -> Result<Option<tokio::task::JoinHandle<()>>> {
    use dyndns_core::Poller;
    use dyndns_fritzbox::FritzBox;

    let Some(url) = &config.fritzbox_url else {
        info!("Env FRITZBOX_ENDPOINT_URL not found, disabling FritzBox polling");
        return Ok(None);
    };
    let Some(interval) = config.poll_interval else {
        info!("Env FRITZBOX_ENDPOINT_INTERVAL not found, disabling polling");
        return Ok(None);
    };

    if config.host_suffix.is_some() {
        info!("Using the IPv6 prefix to construct the IPv6 address");
    }

    let fritzbox = FritzBox::new(url.clone(), config.fritzbox_timeout)?;
    let poller = Poller::new(Arc::new(fritzbox), updater, interval)
        .with_families(
            !config.ipv4_records.is_empty(),
            !config.ipv6_records.is_empty(),
        )
        .with_host_suffix(config.host_suffix);

    Ok(Some(tokio::spawn(poller.run())))
}

#[cfg(not(feature = "fritzbox"))]
fn spawn_poller(
    config: &Config,
    _updater: Arc<dyn Updater>,
) -> Result<Option<tokio::task::JoinHandle<()>>> {
    if config.fritzbox_url.is_some() {
        warn!("dyndnsd was built without FRITZ!Box support, disabling polling");
    }
    Ok(None)
}

/// Run the daemon until a shutdown signal or a fatal worker error
async fn run_daemon(
    config: &Config,
    updater: Arc<dyn Updater>,
    worker: Option<WorkerHandle>,
) -> Result<()> {
    let poller = spawn_poller(config, Arc::clone(&updater))?;

    info!("Daemon initialized successfully");

    let outcome = tokio::select! {
        signal = wait_for_shutdown() => signal.map(|signal| {
            info!("Received shutdown signal: {}", signal);
        }),
        result = wait_for_worker(worker) => result,
    };

    if let Some(poller) = poller {
        poller.abort();
    }
    info!("Shutting down daemon");

    outcome
}

/// Resolve when the reconciliation worker stops; never, if there is none
async fn wait_for_worker(worker: Option<WorkerHandle>) -> Result<()> {
    match worker {
        Some(worker) => match worker.wait().await {
            Ok(()) => anyhow::bail!("Reconciliation worker stopped unexpectedly"),
            Err(e) => Err(anyhow::Error::new(e).context("Reconciliation worker failed")),
        },
        None => std::future::pending().await,
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
