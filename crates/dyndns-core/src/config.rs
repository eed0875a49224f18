//! Configuration types for the dynamic DNS synchronizer
//!
//! This module defines the values the engine consumes. How they are loaded
//! (environment, files) is up to the embedding binary.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Records that receive A updates, in order
    #[serde(default)]
    pub ipv4_records: Vec<String>,

    /// Records that receive AAAA updates, in order
    #[serde(default)]
    pub ipv6_records: Vec<String>,

    /// Capacity of the notification queue
    ///
    /// When the queue is full, `on_new_ip` waits for a free slot instead of
    /// dropping the notification.
    ///
    /// Default: 10 notifications
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Time budget for the provider calls of a single action (in seconds)
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,

    /// What the worker does when a provider call fails
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl UpdaterConfig {
    /// Create a configuration with default engine settings
    pub fn new(ipv4_records: Vec<String>, ipv6_records: Vec<String>) -> Self {
        Self {
            ipv4_records,
            ipv6_records,
            queue_capacity: default_queue_capacity(),
            action_timeout_secs: default_action_timeout_secs(),
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Set the queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the per-action timeout
    pub fn with_action_timeout_secs(mut self, secs: u64) -> Self {
        self.action_timeout_secs = secs;
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Per-action timeout as a `Duration`
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ipv4_records.is_empty() && self.ipv6_records.is_empty() {
            return Err(crate::Error::config(
                "No records configured for either IPv4 or IPv6",
            ));
        }

        if let Some(empty) = self
            .ipv4_records
            .iter()
            .chain(&self.ipv6_records)
            .find(|name| name.trim().is_empty())
        {
            return Err(crate::Error::config(format!(
                "Record names cannot be empty (got {:?})",
                empty
            )));
        }

        if self.queue_capacity == 0 {
            return Err(crate::Error::config("Queue capacity must be > 0"));
        }

        if self.action_timeout_secs == 0 {
            return Err(crate::Error::config("Action timeout must be > 0"));
        }

        Ok(())
    }
}

/// Reaction to a failed provider call during reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the worker and report the error to its owner, which is expected
    /// to terminate the process and let a supervisor restart it
    #[default]
    Exit,
    /// Log the error and carry on with the next action
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exit" => Ok(FailurePolicy::Exit),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(crate::Error::config(format!(
                "Unknown failure policy '{}'. Valid: exit, continue",
                other
            ))),
        }
    }
}

/// Retry policy for provider API requests
///
/// Written as three whitespace-separated integers:
/// `"<max retries> <min delay secs> <max delay secs>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry (in seconds)
    pub min_delay_secs: u64,
    /// Upper bound for the delay between retries (in seconds)
    pub max_delay_secs: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, min_delay_secs: u64, max_delay_secs: u64) -> Self {
        Self {
            max_retries,
            min_delay_secs,
            max_delay_secs,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Delay before retry number `attempt` (0-based)
    ///
    /// Doubles from the minimum delay and saturates at the maximum.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let secs = self
            .min_delay_secs
            .saturating_mul(factor)
            .min(self.max_delay_secs);
        Duration::from_secs(secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1, 30)
    }
}

impl FromStr for RetryPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(crate::Error::config(format!(
                "Retry policy must be '<max retries> <min delay secs> <max delay secs>', got '{}'",
                s
            )));
        }

        let max_retries: u32 = parts[0].parse().map_err(|e| {
            crate::Error::config(format!("Failed to parse retry policy's max retries: {}", e))
        })?;
        let min_delay_secs: u64 = parts[1].parse().map_err(|e| {
            crate::Error::config(format!("Failed to parse retry policy's min delay: {}", e))
        })?;
        let max_delay_secs: u64 = parts[2].parse().map_err(|e| {
            crate::Error::config(format!("Failed to parse retry policy's max delay: {}", e))
        })?;

        if min_delay_secs > max_delay_secs {
            return Err(crate::Error::config(format!(
                "Retry policy's min delay ({}s) exceeds its max delay ({}s)",
                min_delay_secs, max_delay_secs
            )));
        }

        Ok(Self::new(max_retries, min_delay_secs, max_delay_secs))
    }
}

fn default_queue_capacity() -> usize {
    10
}

fn default_action_timeout_secs() -> u64 {
    60
}
