use fleet_inventory::InventoryError;
use remote_command_runner::CommandError;
use thiserror::Error;

/// Error taxonomy for AWS CLI orchestration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AwsCliOpsError {
    #[error("AWS CLI is not installed")]
    CliNotInstalled,

    #[error("AWS CLI has no usable credentials: {message}")]
    NotAuthenticated { message: String },

    /// The service answered with a named error code.
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("AWS CLI command failed: {message}")]
    CommandFailed {
        message: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("AWS CLI command timed out after {timeout_secs}s: {command}")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("Failed to parse AWS CLI output: {message}")]
    ParseError { message: String },
}

impl AwsCliOpsError {
    pub fn code(&self) -> &str {
        match self {
            Self::CliNotInstalled => "aws_cli_not_installed",
            Self::NotAuthenticated { .. } => "aws_not_authenticated",
            Self::Service { code, .. } => code,
            Self::CommandFailed { .. } => "command_failed",
            Self::Timeout { .. } => "timeout",
            Self::ParseError { .. } => "parse_error",
        }
    }

    /// Map into the command taxonomy for a call targeting `instance_id`.
    pub fn into_command_error(self, instance_id: &str) -> CommandError {
        match self {
            Self::Service { code, .. } if code == "InvalidInstanceId" => {
                CommandError::InstanceUnavailable {
                    instance_id: instance_id.to_string(),
                }
            }
            Self::Service { code, .. } if code == "InvocationDoesNotExist" => {
                CommandError::InvocationNotYetRegistered {
                    instance_id: instance_id.to_string(),
                }
            }
            Self::Service { code, message } => CommandError::Service { code, message },
            other => CommandError::service(other.code(), other.to_string()),
        }
    }
}

impl From<AwsCliOpsError> for InventoryError {
    fn from(err: AwsCliOpsError) -> Self {
        match err {
            AwsCliOpsError::NotAuthenticated { message } => InventoryError::Session(message),
            AwsCliOpsError::CliNotInstalled => InventoryError::Session(err.to_string()),
            AwsCliOpsError::Service { code, message } => InventoryError::Backend { code, message },
            other => InventoryError::backend(other.code(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(code: &str) -> AwsCliOpsError {
        AwsCliOpsError::Service {
            code: code.to_string(),
            message: "boom".to_string(),
        }
    }

    #[test]
    fn invalid_instance_is_unavailable() {
        let err = service("InvalidInstanceId").into_command_error("i-1");
        assert_eq!(
            err,
            CommandError::InstanceUnavailable {
                instance_id: "i-1".into()
            }
        );
    }

    #[test]
    fn missing_invocation_is_transient() {
        let err = service("InvocationDoesNotExist").into_command_error("i-1");
        assert!(err.is_transient());
    }

    #[test]
    fn other_service_errors_keep_code() {
        let err = service("ThrottlingException").into_command_error("i-1");
        assert_eq!(err.code(), "ThrottlingException");
        assert!(!err.is_transient());
    }

    #[test]
    fn timeout_maps_to_backend_error() {
        let err: InventoryError = AwsCliOpsError::Timeout {
            command: "aws ec2 describe-instances".into(),
            timeout_secs: 60,
        }
        .into();
        assert_eq!(err.code(), "timeout");
    }

    #[test]
    fn credentials_map_to_session_error() {
        let err: InventoryError = AwsCliOpsError::NotAuthenticated {
            message: "Unable to locate credentials".into(),
        }
        .into();
        assert!(matches!(err, InventoryError::Session(_)));
    }
}
