use fleet_inventory::InventoryError;
use remote_command_runner::CommandError;
use thiserror::Error;

/// Fatal conditions that end a run with a specific exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Setup failed: {0}")]
    Setup(String),

    #[error(transparent)]
    Discovery(InventoryError),

    #[error(transparent)]
    Aborted(CommandError),
}

impl CliError {
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup(message.into())
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Setup(_) => 1,
            Self::Discovery(_) => 2,
            Self::Aborted(_) => 3,
        }
    }
}

/// Exit code for any top-level error; unclassified errors count as setup
/// failures.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<CliError>()
        .map(CliError::exit_code)
        .unwrap_or(1)
}
