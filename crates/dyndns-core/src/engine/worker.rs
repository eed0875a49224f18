//! The single consumer of the notification queue

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::actions::Action;
use crate::config::{FailurePolicy, UpdaterConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, IpVersion, RecordType};

/// TTL (in seconds) of records the engine creates
pub const CREATED_RECORD_TTL: u32 = 120;

/// Proxied flag of records the engine creates
pub const CREATED_RECORD_PROXIED: bool = false;

/// Most recently processed address per family
///
/// Owned by the worker task and touched by nothing else, so plain fields
/// suffice.
#[derive(Debug, Default)]
struct LastAddresses {
    v4: Option<IpAddr>,
    v6: Option<IpAddr>,
}

impl LastAddresses {
    fn slot(&mut self, family: IpVersion) -> &mut Option<IpAddr> {
        match family {
            IpVersion::V4 => &mut self.v4,
            IpVersion::V6 => &mut self.v6,
        }
    }

    fn is_duplicate(&mut self, family: IpVersion, ip: &IpAddr) -> bool {
        self.slot(family).as_ref() == Some(ip)
    }

    fn remember(&mut self, family: IpVersion, ip: IpAddr) {
        *self.slot(family) = Some(ip);
    }
}

/// What a reconciliation pass did to one action's records
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Created { id: String },
    Updated { count: usize },
    Unchanged,
}

pub(crate) struct ReconciliationWorker {
    provider: Arc<dyn DnsProvider>,
    actions: Vec<Action>,
    rx: mpsc::Receiver<IpAddr>,
    last: LastAddresses,
    action_timeout: Duration,
    failure_policy: FailurePolicy,
}

impl ReconciliationWorker {
    pub(crate) fn new(
        provider: Arc<dyn DnsProvider>,
        actions: Vec<Action>,
        rx: mpsc::Receiver<IpAddr>,
        config: &UpdaterConfig,
    ) -> Self {
        Self {
            provider,
            actions,
            rx,
            last: LastAddresses::default(),
            action_timeout: config.action_timeout(),
            failure_policy: config.failure_policy,
        }
    }

    /// Drain the queue until every sender is gone or a pass fails fatally
    pub(crate) async fn run(mut self) -> Result<()> {
        info!(
            provider = self.provider.provider_name(),
            actions = self.actions.len(),
            "Reconciliation worker started"
        );

        while let Some(ip) = self.rx.recv().await {
            self.process(ip).await?;
        }

        debug!("Notification queue closed, worker stopping");
        Ok(())
    }

    async fn process(&mut self, ip: IpAddr) -> Result<()> {
        let ip = ip.to_canonical();
        let family = IpVersion::of(&ip);

        if self.last.is_duplicate(family, &ip) {
            return Ok(());
        }

        info!(%ip, %family, "Received update request");

        let mut result = Ok(());

        for action in self.actions.iter().filter(|a| a.family == family) {
            let outcome = tokio::time::timeout(
                self.action_timeout,
                reconcile(self.provider.as_ref(), action, ip),
            )
            .await
            .unwrap_or_else(|_| {
                Err(Error::timeout(format!(
                    "provider calls exceeded {:?}",
                    self.action_timeout
                )))
            });

            match outcome {
                Ok(Outcome::Created { id }) => {
                    info!(record = %action.record, %family, record_id = %id, "Created DNS record");
                }
                Ok(Outcome::Updated { count }) => {
                    info!(record = %action.record, %family, count, "Updated DNS record");
                }
                Ok(Outcome::Unchanged) => {
                    debug!(record = %action.record, %family, "DNS record already up to date");
                }
                Err(e) => {
                    error!(record = %action.record, %family, error = %e, "Action failed");
                    if self.failure_policy == FailurePolicy::Exit {
                        result = Err(Error::reconciliation(action.record.as_str(), family, e));
                        break;
                    }
                }
            }
        }

        self.last.remember(family, ip);
        result
    }
}

/// Converge one action's records on `ip`
async fn reconcile(provider: &dyn DnsProvider, action: &Action, ip: IpAddr) -> Result<Outcome> {
    let record_type = RecordType::for_version(action.family);
    let content = ip.to_string();

    let records = provider
        .list_records(&action.zone_id, record_type, &action.record)
        .await?;

    if records.is_empty() {
        info!(record = %action.record, family = %action.family, "Creating DNS record");
        let id = provider
            .create_record(
                &action.zone_id,
                record_type,
                &action.record,
                &content,
                CREATED_RECORD_TTL,
                CREATED_RECORD_PROXIED,
            )
            .await?;
        return Ok(Outcome::Created { id });
    }

    let mut count = 0;
    for record in &records {
        if record.content == content {
            continue;
        }

        info!(
            record = %action.record,
            family = %action.family,
            record_id = %record.id,
            previous = %record.content,
            "Updating DNS record"
        );

        // TTL and proxied are echoed back so the provider does not reset them.
        provider
            .update_record(&action.zone_id, &record.id, &content, record.ttl, record.proxied)
            .await?;
        count += 1;
    }

    if count == 0 {
        Ok(Outcome::Unchanged)
    } else {
        Ok(Outcome::Updated { count })
    }
}
