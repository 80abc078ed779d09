//! # AWS CLI ops
//!
//! Implements the inventory and remote command capabilities by running the
//! `aws` CLI.
//!
//! Owns process execution, timeout control, JSON output parsing and
//! normalization of service error codes into the inventory and command
//! error taxonomies.

mod command_runner;
mod error;
mod operations;

pub use command_runner::{AwsCommandRunner, CommandRunOutput, DEFAULT_TIMEOUT_SECS};
pub use error::AwsCliOpsError;
pub use operations::{
    AwsBackend, AwsRegionLister, Ec2InstanceLister, SsmCommandExecutor, SsmManagedInstanceLister,
    StsSessionProbe, DEFAULT_PAGE_SIZE,
};
