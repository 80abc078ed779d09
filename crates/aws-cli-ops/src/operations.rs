use crate::command_runner::AwsCommandRunner;
use crate::AwsCliOpsError;
use async_trait::async_trait;
use fleet_inventory::{
    Filters, InstanceLister, InstanceRecord, InstanceState, InventoryResult, Page, Region,
    RegionLister, SessionProbe,
};
use remote_command_runner::{CommandExecutor, CommandResult, CommandSpec, CommandStatus, StatusPage};
use serde::Deserialize;
use tracing::debug;

/// Default `--max-items` per listing call.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Entry point wiring one [`AwsCommandRunner`] into every capability.
#[derive(Debug, Clone)]
pub struct AwsBackend {
    runner: AwsCommandRunner,
    home_region: Option<String>,
    page_size: usize,
}

impl AwsBackend {
    pub fn new(runner: AwsCommandRunner) -> Self {
        Self {
            runner,
            home_region: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Region used for account-wide calls (region listing, identity).
    pub fn with_home_region(mut self, region: Option<String>) -> Self {
        self.home_region = region;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn regions(&self) -> AwsRegionLister {
        AwsRegionLister {
            runner: self.runner.clone(),
            home_region: self.home_region.clone(),
        }
    }

    pub fn instances(&self) -> Ec2InstanceLister {
        Ec2InstanceLister {
            runner: self.runner.clone(),
            page_size: self.page_size,
        }
    }

    pub fn managed_instances(&self) -> SsmManagedInstanceLister {
        SsmManagedInstanceLister {
            runner: self.runner.clone(),
            page_size: self.page_size,
        }
    }

    pub fn commands(&self, region: &Region) -> SsmCommandExecutor {
        SsmCommandExecutor {
            runner: self.runner.clone(),
            region: region.clone(),
        }
    }

    pub fn session(&self) -> StsSessionProbe {
        StsSessionProbe {
            runner: self.runner.clone(),
            home_region: self.home_region.clone(),
        }
    }
}

// =============================================================================
// Regions
// =============================================================================

#[derive(Debug, Clone)]
pub struct AwsRegionLister {
    runner: AwsCommandRunner,
    home_region: Option<String>,
}

#[async_trait]
impl RegionLister for AwsRegionLister {
    async fn list_regions(&self, include_disabled: bool) -> InventoryResult<Vec<Region>> {
        let mut args = vec!["ec2".to_string(), "describe-regions".to_string()];
        if include_disabled {
            args.push("--all-regions".to_string());
        }

        let output = self.runner.run(&args, self.home_region.as_deref()).await?;
        Ok(parse_regions(&output.stdout, include_disabled)?)
    }
}

fn parse_regions(stdout: &str, include_disabled: bool) -> Result<Vec<Region>, AwsCliOpsError> {
    let parsed: RegionsEnvelope = parse_json(stdout, "ec2 describe-regions")?;
    Ok(parsed
        .regions
        .into_iter()
        .filter(|r| include_disabled || r.opt_in_status.as_deref() != Some("not-opted-in"))
        .map(|r| Region::new(r.region_name))
        .collect())
}

// =============================================================================
// Compute inventory
// =============================================================================

#[derive(Debug, Clone)]
pub struct Ec2InstanceLister {
    runner: AwsCommandRunner,
    page_size: usize,
}

#[async_trait]
impl InstanceLister for Ec2InstanceLister {
    fn source(&self) -> &str {
        "ec2"
    }

    async fn list_page(
        &self,
        region: &Region,
        filters: &Filters,
        page_token: Option<&str>,
    ) -> InventoryResult<Page> {
        let mut args = vec!["ec2".to_string(), "describe-instances".to_string()];
        if !filters.is_empty() {
            args.push("--filters".to_string());
            args.extend(filters.iter().map(|f| {
                format!("Name={},Values={}", f.name, f.values.join(","))
            }));
        }
        push_paging(&mut args, self.page_size, page_token);

        let output = self.runner.run(&args, Some(region.as_str())).await?;
        let page = parse_instances_page(&output.stdout)?;
        debug!(region = %region, records = page.records.len(), "ec2 page");
        Ok(page)
    }
}

fn parse_instances_page(stdout: &str) -> Result<Page, AwsCliOpsError> {
    let parsed: InstancesEnvelope = parse_json(stdout, "ec2 describe-instances")?;
    let records = parsed
        .reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .map(|instance| InstanceRecord {
            instance_id: instance.instance_id,
            state: instance
                .state
                .and_then(|s| s.name)
                .and_then(|name| name.parse::<InstanceState>().ok()),
        })
        .collect();

    Ok(Page {
        records,
        next_token: parsed.next_token,
    })
}

// =============================================================================
// Managed inventory
// =============================================================================

#[derive(Debug, Clone)]
pub struct SsmManagedInstanceLister {
    runner: AwsCommandRunner,
    page_size: usize,
}

#[async_trait]
impl InstanceLister for SsmManagedInstanceLister {
    fn source(&self) -> &str {
        "ssm"
    }

    async fn list_page(
        &self,
        region: &Region,
        filters: &Filters,
        page_token: Option<&str>,
    ) -> InventoryResult<Page> {
        let mut args = vec![
            "ssm".to_string(),
            "describe-instance-information".to_string(),
        ];
        if !filters.is_empty() {
            args.push("--filters".to_string());
            args.extend(filters.iter().map(|f| {
                format!("Key={},Values={}", f.name, f.values.join(","))
            }));
        }
        push_paging(&mut args, self.page_size, page_token);

        let output = self.runner.run(&args, Some(region.as_str())).await?;
        let page = parse_managed_page(&output.stdout)?;
        debug!(region = %region, records = page.records.len(), "ssm page");
        Ok(page)
    }
}

fn parse_managed_page(stdout: &str) -> Result<Page, AwsCliOpsError> {
    let parsed: InstanceInformationEnvelope =
        parse_json(stdout, "ssm describe-instance-information")?;
    let records = parsed
        .instance_information_list
        .into_iter()
        .map(|info| InstanceRecord {
            instance_id: info.instance_id,
            state: None,
        })
        .collect();

    Ok(Page {
        records,
        next_token: parsed.next_token,
    })
}

fn push_paging(args: &mut Vec<String>, page_size: usize, page_token: Option<&str>) {
    args.push("--max-items".to_string());
    args.push(page_size.to_string());
    if let Some(token) = page_token {
        args.push("--starting-token".to_string());
        args.push(token.to_string());
    }
}

// =============================================================================
// Remote commands
// =============================================================================

/// Run Command access scoped to one region.
#[derive(Debug, Clone)]
pub struct SsmCommandExecutor {
    runner: AwsCommandRunner,
    region: Region,
}

#[async_trait]
impl CommandExecutor for SsmCommandExecutor {
    async fn submit_command(&self, instance_id: &str, spec: &CommandSpec) -> CommandResult<String> {
        let parameters = serde_json::to_string(&spec.parameters).map_err(|err| {
            AwsCliOpsError::ParseError {
                message: format!("failed to encode command parameters: {err}"),
            }
            .into_command_error(instance_id)
        })?;

        let args = vec![
            "ssm".to_string(),
            "send-command".to_string(),
            "--instance-ids".to_string(),
            instance_id.to_string(),
            "--document-name".to_string(),
            spec.document_name.clone(),
            "--parameters".to_string(),
            parameters,
        ];

        let output = self
            .runner
            .run(&args, Some(self.region.as_str()))
            .await
            .map_err(|err| err.into_command_error(instance_id))?;

        parse_command_id(&output.stdout).map_err(|err| err.into_command_error(instance_id))
    }

    /// `get-command-invocation` returns the whole (service-truncated) output
    /// in one response, so `output_token` is never needed here.
    async fn get_command_status(
        &self,
        command_id: &str,
        instance_id: &str,
        _output_token: Option<&str>,
    ) -> CommandResult<StatusPage> {
        let args = vec![
            "ssm".to_string(),
            "get-command-invocation".to_string(),
            "--command-id".to_string(),
            command_id.to_string(),
            "--instance-id".to_string(),
            instance_id.to_string(),
        ];

        let output = self
            .runner
            .run(&args, Some(self.region.as_str()))
            .await
            .map_err(|err| err.into_command_error(instance_id))?;

        parse_invocation(&output.stdout).map_err(|err| err.into_command_error(instance_id))
    }
}

fn parse_command_id(stdout: &str) -> Result<String, AwsCliOpsError> {
    let parsed: SendCommandEnvelope = parse_json(stdout, "ssm send-command")?;
    Ok(parsed.command.command_id)
}

fn parse_invocation(stdout: &str) -> Result<StatusPage, AwsCliOpsError> {
    let parsed: CommandInvocationPayload = parse_json(stdout, "ssm get-command-invocation")?;
    Ok(StatusPage {
        status: CommandStatus::parse(&parsed.status),
        stdout: parsed.standard_output_content.unwrap_or_default(),
        stderr: parsed.standard_error_content.unwrap_or_default(),
        next_token: None,
    })
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Clone)]
pub struct StsSessionProbe {
    runner: AwsCommandRunner,
    home_region: Option<String>,
}

#[async_trait]
impl SessionProbe for StsSessionProbe {
    async fn verify_session(&self) -> InventoryResult<String> {
        let args = vec!["sts".to_string(), "get-caller-identity".to_string()];
        let output = self.runner.run(&args, self.home_region.as_deref()).await?;
        Ok(parse_account(&output.stdout)?)
    }
}

fn parse_account(stdout: &str) -> Result<String, AwsCliOpsError> {
    let parsed: CallerIdentity = parse_json(stdout, "sts get-caller-identity")?;
    Ok(parsed.account)
}

fn parse_json<'a, T: Deserialize<'a>>(stdout: &'a str, command: &str) -> Result<T, AwsCliOpsError> {
    serde_json::from_str(stdout).map_err(|err| AwsCliOpsError::ParseError {
        message: format!("failed to parse {command} output: {err}"),
    })
}

// =============================================================================
// Wire shapes
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RegionsEnvelope {
    #[serde(default)]
    regions: Vec<AwsRegion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsRegion {
    region_name: String,
    opt_in_status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstancesEnvelope {
    #[serde(default)]
    reservations: Vec<Reservation>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Ec2Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2Instance {
    instance_id: Option<String>,
    state: Option<Ec2State>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2State {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceInformationEnvelope {
    #[serde(default)]
    instance_information_list: Vec<InstanceInformation>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceInformation {
    instance_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendCommandEnvelope {
    command: SentCommand,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SentCommand {
    command_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommandInvocationPayload {
    status: String,
    standard_output_content: Option<String>,
    standard_error_content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    account: String,
}
