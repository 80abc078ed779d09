use crate::AwsCliOpsError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Raw command output from an aws subprocess.
#[derive(Debug, Clone)]
pub struct CommandRunOutput {
    pub stdout: String,
}

/// Responsible for locating and executing the AWS CLI.
#[derive(Debug, Clone)]
pub struct AwsCommandRunner {
    executable: String,
    profile: Option<String>,
    timeout_secs: u64,
}

impl Default for AwsCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl AwsCommandRunner {
    pub fn new() -> Self {
        Self {
            executable: resolve_aws_executable(),
            profile: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs.max(1);
        self
    }

    /// Run `aws <args>` with JSON output, scoped to `region` when given.
    pub async fn run(
        &self,
        args: &[String],
        region: Option<&str>,
    ) -> Result<CommandRunOutput, AwsCliOpsError> {
        let args = self.full_args(args, region);
        let command_repr = format!("{} {}", self.executable, args.join(" "));
        debug!(command = %command_repr, "running aws command");

        let mut cmd = Command::new(&self.executable);
        cmd.args(&args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        apply_non_interactive_env(&mut cmd);

        let output = match timeout(Duration::from_secs(self.timeout_secs), cmd.output()).await {
            Err(_) => {
                return Err(AwsCliOpsError::Timeout {
                    command: command_repr,
                    timeout_secs: self.timeout_secs,
                });
            }
            Ok(Err(err)) => {
                return if err.kind() == std::io::ErrorKind::NotFound {
                    Err(AwsCliOpsError::CliNotInstalled)
                } else {
                    Err(AwsCliOpsError::CommandFailed {
                        message: format!("failed to execute aws command: {err}"),
                        exit_code: None,
                        stderr: String::new(),
                    })
                };
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if output.status.success() {
            return Ok(CommandRunOutput { stdout });
        }

        Err(classify_failed_command(output.status.code(), &stdout, &stderr))
    }

    fn full_args(&self, args: &[String], region: Option<&str>) -> Vec<String> {
        let mut full = args.to_vec();
        full.push("--output".to_string());
        full.push("json".to_string());
        full.push("--no-cli-pager".to_string());

        if let Some(region) = region.filter(|r| !r.trim().is_empty()) {
            full.push("--region".to_string());
            full.push(region.to_string());
        }

        if let Some(profile) = self.profile.as_deref() {
            full.push("--profile".to_string());
            full.push(profile.to_string());
        }

        full
    }
}

fn apply_non_interactive_env(cmd: &mut Command) {
    cmd.env("AWS_PAGER", "");
    cmd.env("AWS_CLI_AUTO_PROMPT", "off");
    cmd.env("NO_COLOR", "1");
}

fn resolve_aws_executable() -> String {
    if let Ok(path) = std::env::var("AWS_CLI_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    for candidate in [
        "/opt/homebrew/bin/aws",
        "/usr/local/bin/aws",
        "/usr/bin/aws",
    ] {
        if Path::new(candidate).exists() {
            return candidate.to_string();
        }
    }

    "aws".to_string()
}

/// Service error codes that mean the credentials themselves are unusable.
const AUTH_ERROR_CODES: [&str; 5] = [
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "UnrecognizedClientException",
    "AuthFailure",
];

fn classify_failed_command(exit_code: Option<i32>, stdout: &str, stderr: &str) -> AwsCliOpsError {
    if let Some((code, message)) = parse_service_error(stderr) {
        if AUTH_ERROR_CODES.contains(&code.as_str()) {
            return AwsCliOpsError::NotAuthenticated {
                message: format!("{code}: {message}"),
            };
        }
        return AwsCliOpsError::Service { code, message };
    }

    let lowered = stderr.to_ascii_lowercase();
    if lowered.contains("unable to locate credentials")
        || lowered.contains("could not be found")
        || lowered.contains("token has expired")
        || lowered.contains("sso session")
    {
        return AwsCliOpsError::NotAuthenticated {
            message: non_empty(stderr, stdout, "AWS credentials are not configured"),
        };
    }

    AwsCliOpsError::CommandFailed {
        message: non_empty(
            stderr,
            stdout,
            &format!("aws command failed with exit code {:?}", exit_code),
        ),
        exit_code,
        stderr: stderr.to_string(),
    }
}

/// Parse `An error occurred (Code) when calling the Op operation: message`.
fn parse_service_error(stderr: &str) -> Option<(String, String)> {
    let line = stderr
        .lines()
        .find(|line| line.contains("An error occurred ("))?;
    let start = line.find("An error occurred (")? + "An error occurred (".len();
    let rest = &line[start..];
    let end = rest.find(')')?;
    let code = rest[..end].trim().to_string();
    if code.is_empty() {
        return None;
    }

    let message = rest[end..]
        .split_once(": ")
        .map(|(_, message)| message.trim().to_string())
        .unwrap_or_else(|| line.trim().to_string());

    Some((code, message))
}

fn non_empty(primary: &str, secondary: &str, fallback: &str) -> String {
    if !primary.trim().is_empty() {
        primary.to_string()
    } else if !secondary.trim().is_empty() {
        secondary.to_string()
    } else {
        fallback.to_string()
    }
}
