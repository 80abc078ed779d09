//! Command request and invocation types.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Document that runs its `commands` parameter as a shell script.
pub const SHELL_DOCUMENT: &str = "AWS-RunShellScript";

/// Parameter carrying the script lines of [`SHELL_DOCUMENT`].
pub const COMMANDS_PARAMETER: &str = "commands";

/// Invocation status as reported by the management service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandStatus {
    Pending,
    InProgress,
    Delayed,
    Success,
    Failed,
    Cancelled,
    TimedOut,
    /// Moves on to `Cancelled`.
    Cancelling,
    /// A status this client does not know; handled as terminal failure.
    Other(String),
}

impl CommandStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "Pending" => Self::Pending,
            "InProgress" => Self::InProgress,
            "Delayed" => Self::Delayed,
            "Success" => Self::Success,
            "Failed" => Self::Failed,
            "Cancelled" => Self::Cancelled,
            "TimedOut" => Self::TimedOut,
            "Cancelling" => Self::Cancelling,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "InProgress",
            Self::Delayed => "Delayed",
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
            Self::TimedOut => "TimedOut",
            Self::Cancelling => "Cancelling",
            Self::Other(value) => value,
        }
    }

    /// Still running; query again after the poll interval.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::InProgress | Self::Delayed | Self::Cancelling
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for CommandStatus {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

/// What to run on an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub document_name: String,
    pub parameters: BTreeMap<String, Vec<String>>,
}

impl CommandSpec {
    pub fn new(document_name: impl Into<String>) -> Self {
        Self {
            document_name: document_name.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Shell script lines run through [`SHELL_DOCUMENT`].
    pub fn shell<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(SHELL_DOCUMENT).with_parameter(COMMANDS_PARAMETER, commands)
    }

    pub fn with_parameter<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }
}

/// One status query response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPage {
    pub status: CommandStatus,
    pub stdout: String,
    pub stderr: String,
    pub next_token: Option<String>,
}

impl StatusPage {
    pub fn new(status: CommandStatus) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: String::new(),
            next_token: None,
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn with_next_token(mut self, token: impl Into<String>) -> Self {
        self.next_token = Some(token.into());
        self
    }
}

/// A submitted command on one instance. Only the poller mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub command_id: String,
    pub instance_id: String,
    pub status: CommandStatus,
    pub stdout: String,
    pub stderr: String,
    pub next_token: Option<String>,
}

impl CommandInvocation {
    pub fn new(command_id: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
            instance_id: instance_id.into(),
            status: CommandStatus::Pending,
            stdout: String::new(),
            stderr: String::new(),
            next_token: None,
        }
    }
}
