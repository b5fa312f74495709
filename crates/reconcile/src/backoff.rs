//! Per-resource backoff for failed passes
//!
//! A resource whose pass failed is held back for an exponentially growing
//! delay. Fatal failures are held until the record changes.

use crate::error::ErrorCategory;
use crate::types::ResourceKey;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Exponential delay configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Multiplier applied per consecutive failure
    pub backoff_factor: f64,
    /// Upper bound for any delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            ..Default::default()
        }
    }

    /// Delay before the next attempt after `failures` consecutive failures
    pub fn delay_for_failures(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

#[derive(Debug, Clone)]
struct Entry {
    failures: u32,
    /// `None` holds the resource until its version changes
    retry_at: Option<Instant>,
    resource_version: u64,
}

/// Tracks failing resources between scheduler passes
#[derive(Debug, Default)]
pub struct BackoffTracker {
    policy: RetryPolicy,
    entries: HashMap<ResourceKey, Entry>,
}

impl BackoffTracker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    /// Whether the resource may be reconciled at `now`
    pub fn is_ready(&self, key: &ResourceKey, resource_version: u64, now: Instant) -> bool {
        match self.entries.get(key) {
            None => true,
            Some(entry) if entry.resource_version != resource_version => true,
            Some(entry) => entry.retry_at.is_some_and(|at| now >= at),
        }
    }

    /// Record a failed pass
    pub fn record_failure(
        &mut self,
        key: &ResourceKey,
        resource_version: u64,
        category: ErrorCategory,
        now: Instant,
    ) {
        if category == ErrorCategory::Cancelled {
            // cancellation says nothing about the resource
            return;
        }

        let entry = self.entries.entry(key.clone()).or_insert(Entry {
            failures: 0,
            retry_at: None,
            resource_version,
        });
        if entry.resource_version != resource_version {
            entry.failures = 0;
            entry.resource_version = resource_version;
        }
        entry.failures = entry.failures.saturating_add(1);
        let failures = entry.failures;
        entry.retry_at = category
            .is_retryable()
            .then(|| now + self.policy.delay_for_failures(failures));

        log::debug!(
            "{key}: failure {} ({}), next attempt {}",
            entry.failures,
            category.description(),
            match entry.retry_at {
                Some(at) => format!("in {:?}", at.saturating_duration_since(now)),
                None => "after the record changes".to_string(),
            }
        );
    }

    /// Clear state after a successful pass
    pub fn record_success(&mut self, key: &ResourceKey) {
        self.entries.remove(key);
    }

    /// Consecutive failures recorded for a resource
    pub fn failures(&self, key: &ResourceKey) -> u32 {
        self.entries.get(key).map_or(0, |e| e.failures)
    }

    /// Number of resources currently held back
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
