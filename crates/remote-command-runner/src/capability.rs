//! Remote execution capability.

use crate::error::CommandResult;
use crate::types::{CommandSpec, StatusPage};
use async_trait::async_trait;

/// Submits commands to managed instances and reports their progress.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Returns the service-assigned command id.
    async fn submit_command(&self, instance_id: &str, spec: &CommandSpec) -> CommandResult<String>;

    /// Status and output for one invocation. `output_token` continues a
    /// paginated output stream.
    async fn get_command_status(
        &self,
        command_id: &str,
        instance_id: &str,
        output_token: Option<&str>,
    ) -> CommandResult<StatusPage>;
}
