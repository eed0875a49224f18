//! Startup-time mapping of configured record names to provider zones

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::config::UpdaterConfig;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, IpVersion};

/// One configured (record, family) pair with its resolved zone
///
/// Built once by [`resolve_actions`] and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Fully qualified record name
    pub record: String,
    /// Provider zone identifier of the record's registrable domain
    pub zone_id: String,
    /// Address family this action receives
    pub family: IpVersion,
}

/// Maps a record name to its registrable domain (public suffix + one label)
pub trait DomainExtractor: Send + Sync {
    fn registrable_domain(&self, name: &str) -> Result<String>;
}

/// Public suffix options for zone lookup
///
/// Private suffixes (`eu.org`, `duckdns.org`, ...) count as suffixes, so
/// `home.myname.eu.org` belongs to the zone `myname.eu.org`.
pub fn extractor_options() -> tldextract::TldOption {
    tldextract::TldOption::default().private_domains(true)
}

/// Extractor built from [`extractor_options`]
pub fn registrable_domain_extractor() -> tldextract::TldExtractor {
    tldextract::TldExtractor::new(extractor_options())
}

impl DomainExtractor for tldextract::TldExtractor {
    fn registrable_domain(&self, name: &str) -> Result<String> {
        let host = name.trim().trim_end_matches('.');
        let host = host.strip_prefix("*.").unwrap_or(host);
        let extracted = self
            .extract(&format!("http://{}", host))
            .map_err(|e| Error::zone_resolution(name, format!("Extractor error: {}", e)))?;

        match (extracted.domain, extracted.suffix) {
            (Some(domain), Some(suffix)) => Ok(format!(
                "{}.{}",
                domain.to_lowercase(),
                suffix.to_lowercase()
            )),
            _ => Err(Error::zone_resolution(
                name,
                "name has no registrable domain below a public suffix",
            )),
        }
    }
}

/// Resolve the zone of every configured record and build the action list
///
/// A record configured for both families is resolved once, and records
/// sharing a registrable domain share one zone lookup. The returned list
/// holds the IPv4 actions in configured order followed by the IPv6 actions,
/// with at most one action per (record, family) pair.
///
/// Any failure aborts the whole resolution; the engine never starts with a
/// partial action list.
pub async fn resolve_actions(
    provider: &dyn DnsProvider,
    extractor: &dyn DomainExtractor,
    config: &UpdaterConfig,
) -> Result<Vec<Action>> {
    let mut zone_by_record: HashMap<&str, String> = HashMap::new();
    let mut zone_by_domain: HashMap<String, String> = HashMap::new();

    for record in config.ipv4_records.iter().chain(&config.ipv6_records) {
        if zone_by_record.contains_key(record.as_str()) {
            continue;
        }

        let domain = extractor.registrable_domain(record)?;

        let zone_id = match zone_by_domain.get(&domain) {
            Some(zone_id) => zone_id.clone(),
            None => {
                let zone_id = provider
                    .resolve_zone_id(&domain)
                    .await
                    .map_err(|e| Error::zone_resolution(record.as_str(), e.to_string()))?;
                info!(%record, %domain, %zone_id, "Resolved zone");
                zone_by_domain.insert(domain, zone_id.clone());
                zone_id
            }
        };

        zone_by_record.insert(record.as_str(), zone_id);
    }

    let mut actions = Vec::with_capacity(config.ipv4_records.len() + config.ipv6_records.len());
    let families = [
        (&config.ipv4_records, IpVersion::V4),
        (&config.ipv6_records, IpVersion::V6),
    ];

    let mut seen: HashSet<(&str, IpVersion)> = HashSet::new();

    for (records, family) in families {
        for record in records {
            if !seen.insert((record.as_str(), family)) {
                debug!(%record, %family, "Ignoring duplicate record entry");
                continue;
            }

            let zone_id = zone_by_record
                .get(record.as_str())
                .cloned()
                .ok_or_else(|| Error::zone_resolution(record.as_str(), "zone missing after lookup"))?;

            debug!(%record, %family, %zone_id, "Registered action");
            actions.push(Action {
                record: record.clone(),
                zone_id,
                family,
            });
        }
    }

    Ok(actions)
}
