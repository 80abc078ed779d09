//! Configuration management for fleet-audit.
//!
//! Values come from, in increasing priority: built-in defaults, the JSON
//! config file, environment variables, and finally CLI flags (applied by the
//! binary).

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default number of regions or instances processed at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default remote-execution document for shell commands.
pub const DEFAULT_DOCUMENT_NAME: &str = "AWS-RunShellScript";

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Append structured JSONL logs to `~/.fleet-audit/logs/audit.jsonl`.
    pub json_log_file: bool,
    /// Region used when region discovery fails.
    pub default_region: Option<String>,
    /// Worker pool size for regions and instances.
    pub concurrency: usize,
    pub retry: RetrySettings,
    pub poll: PollSettings,
    pub inventory: InventorySettings,
    pub command: CommandSettings,
    pub aws: AwsSettings,
}

/// Dispatch retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub delay_secs: u64,
}

/// Command status polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_secs: u64,
    /// Upper bound on time spent polling a single command.
    pub max_wait_secs: u64,
    /// Upper bound on continuation pages read from a single command.
    pub max_output_pages: usize,
}

/// Inventory pagination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    pub page_size: u32,
    pub max_pages: usize,
    /// Lifecycle states that count as part of the primary inventory.
    pub active_states: Vec<String>,
    /// Prefix every managed-inventory identifier must carry.
    pub managed_id_prefix: String,
}

/// Remote command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    pub document_name: String,
    /// Shell lines run by `exec` when none are given on the command line.
    pub default_commands: Vec<String>,
}

/// Settings for the `aws` CLI backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSettings {
    pub profile: Option<String>,
    /// Executable override; resolved from PATH when unset.
    pub executable: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_log_file: false,
            default_region: None,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetrySettings::default(),
            poll: PollSettings::default(),
            inventory: InventorySettings::default(),
            command: CommandSettings::default(),
            aws: AwsSettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay_secs: 5,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 2,
            max_wait_secs: 300,
            max_output_pages: 100,
        }
    }
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 1_000,
            active_states: ["pending", "running", "stopping", "stopped"]
                .into_iter()
                .map(String::from)
                .collect(),
            managed_id_prefix: "i-".to_string(),
        }
    }
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            document_name: DEFAULT_DOCUMENT_NAME.to_string(),
            default_commands: vec!["cat /etc/centos-release".to_string()],
        }
    }
}

impl RetrySettings {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

impl Config {
    /// Load `config.json` under `paths` (defaults when absent), then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();
        let exists = config_path.exists();
        debug!(path = %config_path.display(), exists, "loading configuration");

        let mut config = if exists {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to `config.json` under `paths`.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Reject values that would make a run meaningless or unbounded.
    pub fn validate(&self) -> CoreResult<()> {
        if self.concurrency == 0 {
            return Err(CoreError::Config("concurrency must be at least 1".into()));
        }
        if self.poll.max_wait_secs == 0 {
            return Err(CoreError::Config("poll.max_wait_secs must be positive".into()));
        }
        if self.inventory.max_pages == 0 {
            return Err(CoreError::Config("inventory.max_pages must be positive".into()));
        }
        if self.command.document_name.trim().is_empty() {
            return Err(CoreError::Config("command.document_name must not be empty".into()));
        }
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an environment lookup.
    ///
    /// `FLEET_AUDIT_DEFAULT_REGION` wins over `AWS_REGION`, which wins over
    /// `AWS_DEFAULT_REGION`; none of them replace a region set in the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).and_then(non_empty);

        if let Some(level) = lookup("FLEET_AUDIT_LOG_LEVEL") {
            self.log_level = level;
        }

        if let Some(region) = lookup("FLEET_AUDIT_DEFAULT_REGION") {
            self.default_region = Some(region);
        } else if self.default_region.is_none() {
            self.default_region = lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION"));
        }

        if let Some(concurrency) = lookup("FLEET_AUDIT_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.concurrency = concurrency;
        }

        if self.aws.profile.is_none() {
            self.aws.profile = lookup("AWS_PROFILE");
        }
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
