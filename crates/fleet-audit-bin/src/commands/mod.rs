//! CLI command implementations.

mod exec;
mod unmanaged;

pub use exec::{exec, ExecArgs};
pub use unmanaged::{unmanaged, UnmanagedArgs};

use crate::error::CliError;
use crate::output::OutputFormat;
use audit_config_and_utils::Config;
use aws_cli_ops::{AwsBackend, AwsCommandRunner};
use fleet_inventory::{
    InstanceIdFormat, InstanceLister, InstanceState, InventoryFetcher, InventorySnapshot, Region,
    RegionLister, SessionProbe, SnapshotBackend,
};
use remote_command_runner::CommandExecutor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub format: OutputFormat,
    pub snapshot: Option<PathBuf>,
}

/// Capability handles for one run.
pub struct Backends {
    pub regions: Arc<dyn RegionLister>,
    pub primary: Arc<dyn InstanceLister>,
    pub secondary: Arc<dyn InstanceLister>,
    pub session: Arc<dyn SessionProbe>,
    aws: Option<AwsBackend>,
}

impl Backends {
    /// Live AWS CLI access, or an exported snapshot with `--snapshot`.
    pub fn connect(global: &GlobalOptions, config: &Config) -> Result<Self, CliError> {
        match &global.snapshot {
            Some(path) => {
                let snapshot = InventorySnapshot::load(path)
                    .map_err(|err| CliError::setup(format!("cannot load snapshot: {err}")))?;
                info!(
                    path = %path.display(),
                    regions = snapshot.regions.len(),
                    "using inventory snapshot"
                );
                let backend = SnapshotBackend::new(snapshot)
                    .with_page_size(config.inventory.page_size as usize);
                Ok(Self::from_snapshot(backend))
            }
            None => Ok(Self::from_aws(aws_backend(config))),
        }
    }

    pub fn from_aws(backend: AwsBackend) -> Self {
        Self {
            regions: Arc::new(backend.regions()),
            primary: Arc::new(backend.instances()),
            secondary: Arc::new(backend.managed_instances()),
            session: Arc::new(backend.session()),
            aws: Some(backend),
        }
    }

    pub fn from_snapshot(backend: SnapshotBackend) -> Self {
        Self {
            regions: Arc::new(backend.clone()),
            primary: Arc::new(backend.primary()),
            secondary: Arc::new(backend.managed()),
            session: Arc::new(backend),
            aws: None,
        }
    }

    /// Remote command access in `region`.
    pub fn commands(&self, region: &Region) -> Result<Arc<dyn CommandExecutor>, CliError> {
        match &self.aws {
            Some(backend) => Ok(Arc::new(backend.commands(region))),
            None => Err(CliError::setup(
                "remote commands need live AWS access; --snapshot only serves inventory",
            )),
        }
    }

    /// Fail fast when credentials are missing or the CLI is not installed.
    pub async fn verify_session(&self) -> Result<String, CliError> {
        let account = self
            .session
            .verify_session()
            .await
            .map_err(|err| CliError::setup(err.to_string()))?;
        info!(account = %account, "session verified");
        Ok(account)
    }
}

fn aws_backend(config: &Config) -> AwsBackend {
    let mut runner = AwsCommandRunner::new().with_profile(config.aws.profile.clone());
    if let Some(executable) = config.aws.executable.as_deref() {
        runner = runner.with_executable(executable);
    }
    if let Some(timeout_secs) = config.aws.timeout_secs {
        runner = runner.with_timeout_secs(timeout_secs);
    }

    AwsBackend::new(runner)
        .with_home_region(config.default_region.clone())
        .with_page_size(config.inventory.page_size as usize)
}

/// Configured active states, parsed.
pub fn active_states(config: &Config) -> Result<Vec<InstanceState>, CliError> {
    config
        .inventory
        .active_states
        .iter()
        .map(|raw| raw.parse::<InstanceState>().map_err(CliError::Setup))
        .collect()
}

pub fn primary_fetcher(backends: &Backends, config: &Config) -> InventoryFetcher {
    InventoryFetcher::new(backends.primary.clone()).with_max_pages(config.inventory.max_pages)
}

pub fn secondary_fetcher(backends: &Backends, config: &Config) -> InventoryFetcher {
    InventoryFetcher::new(backends.secondary.clone())
        .with_id_format(InstanceIdFormat::with_prefix(
            config.inventory.managed_id_prefix.clone(),
        ))
        .with_max_pages(config.inventory.max_pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_active_states_parse() {
        let states = active_states(&Config::default()).unwrap();
        assert_eq!(states, InstanceState::DEFAULT_ACTIVE.to_vec());
    }

    #[test]
    fn unknown_state_is_setup_error() {
        let mut config = Config::default();
        config.inventory.active_states = vec!["running".into(), "hibernating".into()];
        let err = active_states(&config).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn missing_snapshot_is_setup_error() {
        let global = GlobalOptions {
            snapshot: Some(PathBuf::from("/nonexistent/snapshot.json")),
            ..GlobalOptions::default()
        };
        let err = Backends::connect(&global, &Config::default()).err().unwrap();
        assert!(err.to_string().contains("cannot load snapshot"));
    }

    #[test]
    fn snapshot_mode_has_no_command_access() {
        let backends = Backends::from_snapshot(SnapshotBackend::new(InventorySnapshot::default()));
        assert!(backends.commands(&Region::from("us-east-1")).is_err());
    }
}
