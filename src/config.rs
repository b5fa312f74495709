//! Controller settings loaded from `stmtctl.toml`
//!
//! Every field has a default, so a missing file or a partial file is fine:
//!
//! ```toml
//! poll_interval_secs = 60
//! max_concurrency = 5
//! attempt_policy = "at-most-once"
//! timeout_secs = 30
//! state_dir = "~/dbs/stmtctl"
//!
//! [retry]
//! base_delay_secs = 1
//! max_delay_secs = 300
//! ```

use anyhow::{Context, Result, bail};
use reconcile::{AttemptPolicy, ReconcileOptions, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

/// Backoff settings for failed passes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_secs: 1,
            max_delay_secs: 300,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.base_delay_secs),
            Duration::from_secs(self.max_delay_secs),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between passes in `run`
    pub poll_interval_secs: u64,
    /// Resources of one kind reconciled at once
    pub max_concurrency: usize,
    pub attempt_policy: AttemptPolicy,
    /// Deadline for a single resource's pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Where objects are stored; falls back to the XDG state directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<String>,
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            max_concurrency: reconcile::types::DEFAULT_MAX_CONCURRENCY,
            attempt_policy: AttemptPolicy::default(),
            timeout_secs: None,
            state_dir: None,
            retry: RetrySettings::default(),
        }
    }
}

impl Settings {
    /// Load from the default settings file, or defaults when it is absent
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::settings_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            bail!("max_concurrency must be at least 1");
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }
        if self.retry.base_delay_secs > self.retry.max_delay_secs {
            bail!("retry.base_delay_secs must not exceed retry.max_delay_secs");
        }
        Ok(())
    }

    /// Resolved state directory; the CLI flag wins over the file
    pub fn state_dir(&self, cli_override: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = cli_override {
            return Ok(dir.to_path_buf());
        }
        match &self.state_dir {
            Some(dir) => Ok(paths::expand_path(dir)),
            None => paths::state_dir(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            jobs: self.max_concurrency,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, jobs: Option<usize>, timeout_secs: Option<u64>) -> Self {
        if let Some(jobs) = jobs {
            self.max_concurrency = jobs.max(1);
        }
        if timeout_secs.is_some() {
            self.timeout_secs = timeout_secs;
        }
        self
    }
}
