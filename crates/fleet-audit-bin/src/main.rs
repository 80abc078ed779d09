//! fleet-audit - find instances outside management coverage and run commands
//! across a fleet.

mod commands;
mod error;
mod output;

use anyhow::Context;
use audit_config_and_utils::{init_logging, Config, Paths};
use clap::{Parser, Subcommand};
use commands::{ExecArgs, GlobalOptions, UnmanagedArgs};
use std::path::PathBuf;
use tracing::debug;

/// fleet-audit - Multi-region management coverage audit.
#[derive(Parser)]
#[command(name = "fleet-audit")]
#[command(about = "Audit management coverage and run remote commands across regions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Configuration file (defaults to ~/.fleet-audit/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// AWS CLI profile
    #[arg(long, env = "AWS_PROFILE", global = true)]
    profile: Option<String>,

    /// Read inventories from an exported snapshot instead of AWS
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Also write structured JSON logs to ~/.fleet-audit/logs
    #[arg(long, global = true)]
    json_log: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List instances the management service does not know about
    Unmanaged {
        /// Region to scan (repeatable; default: every enabled region)
        #[arg(short, long = "region")]
        regions: Vec<String>,

        /// Region to scan alone when region discovery fails
        #[arg(long)]
        default_region: Option<String>,

        /// Regions scanned at once
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Run a shell command on instances and collect one result per instance
    Exec {
        /// Region of the instances
        #[arg(short, long)]
        region: Option<String>,

        /// Target instance (repeatable; default: every active instance)
        #[arg(short, long = "instance")]
        instances: Vec<String>,

        /// Script line to run (repeatable)
        #[arg(long = "command")]
        commands: Vec<String>,

        /// Command document name
        #[arg(long)]
        document: Option<String>,

        /// Keep the full output instead of its first line
        #[arg(long)]
        full_output: bool,

        /// Stop at the first unexpected error
        #[arg(long)]
        fail_fast: bool,

        /// Seconds to wait for each command
        #[arg(long = "max-wait")]
        max_wait_secs: Option<u64>,

        /// Instances handled at once
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
}

fn load_config(cli: &Cli, paths: &Paths) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from_file(path)
                .with_context(|| format!("cannot read config {}", path.display()))?;
            config.apply_env(|name| std::env::var(name).ok());
            config
        }
        None => Config::load(paths).context("cannot load configuration")?,
    };

    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if cli.profile.is_some() {
        config.aws.profile = cli.profile.clone();
    }
    if cli.json_log {
        config.json_log_file = true;
    }

    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let global = GlobalOptions {
        format: cli.format,
        snapshot: cli.snapshot,
    };

    match cli.command {
        Commands::Unmanaged {
            regions,
            default_region,
            concurrency,
        } => {
            let args = UnmanagedArgs {
                regions,
                default_region,
                concurrency,
            };
            commands::unmanaged(args, &global, &config).await
        }
        Commands::Exec {
            region,
            instances,
            commands,
            document,
            full_output,
            fail_fast,
            max_wait_secs,
            concurrency,
        } => {
            let args = ExecArgs {
                region,
                instances,
                commands,
                document,
                full_output,
                fail_fast,
                max_wait_secs,
                concurrency,
            };
            commands::exec(args, &global, &config).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    let paths = match Paths::new() {
        Ok(paths) => paths,
        Err(e) => {
            output::print_error(&e.to_string(), &format);
            std::process::exit(1);
        }
    };

    let config = match load_config(&cli, &paths) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&format!("{e:#}"), &format);
            std::process::exit(1);
        }
    };

    init_logging(
        "fleet-audit",
        &config.log_level,
        config.json_log_file,
        Some(&paths),
    );
    debug!(
        concurrency = config.concurrency,
        region = ?config.default_region,
        "configuration loaded"
    );

    if let Err(e) = run(cli, config).await {
        output::print_error(&format!("{e:#}"), &format);
        std::process::exit(error::exit_code(&e));
    }
}
