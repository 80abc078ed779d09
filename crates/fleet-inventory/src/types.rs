//! Inventory data types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Filter key carrying the allowed instance lifecycle states.
pub const STATE_FILTER: &str = "instance-state-name";

/// Filter key scoping the managed inventory to one resource type.
pub const RESOURCE_TYPE_FILTER: &str = "ResourceType";

/// Managed-inventory resource type for compute instances.
pub const EC2_RESOURCE_TYPE: &str = "EC2Instance";

/// Opaque identifier of an isolated scanning domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Region {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Region {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Instance lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    Terminated,
    ShuttingDown,
}

impl InstanceState {
    pub const ALL: [InstanceState; 6] = [
        Self::Pending,
        Self::Running,
        Self::Stopping,
        Self::Stopped,
        Self::Terminated,
        Self::ShuttingDown,
    ];

    /// States that still occupy capacity and can be managed.
    pub const DEFAULT_ACTIVE: [InstanceState; 4] =
        [Self::Pending, Self::Running, Self::Stopping, Self::Stopped];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Terminated => "terminated",
            Self::ShuttingDown => "shutting-down",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| format!("unknown instance state: {s}"))
    }
}

/// One record as returned by a listing backend.
///
/// Backends pass through whatever they received; a record without an
/// identifier is malformed and skipped by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance_id: Option<String>,
    pub state: Option<InstanceState>,
}

impl InstanceRecord {
    pub fn new(instance_id: impl Into<String>, state: Option<InstanceState>) -> Self {
        Self {
            instance_id: Some(instance_id.into()),
            state,
        }
    }

    pub fn running(instance_id: impl Into<String>) -> Self {
        Self::new(instance_id, Some(InstanceState::Running))
    }
}

/// One page of listing results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<InstanceRecord>,
    pub next_token: Option<String>,
}

impl Page {
    pub fn last(records: Vec<InstanceRecord>) -> Self {
        Self {
            records,
            next_token: None,
        }
    }

    pub fn with_next(records: Vec<InstanceRecord>, next_token: impl Into<String>) -> Self {
        Self {
            records,
            next_token: Some(next_token.into()),
        }
    }
}

/// A single key/value-list predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

/// Listing predicates: AND across filters, OR within a filter's values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(Vec<Filter>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.push(Filter {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Primary inventory scope: instances in any of `states`.
    pub fn active_states(states: &[InstanceState]) -> Self {
        Self::new().with(STATE_FILTER, states.iter().map(InstanceState::as_str))
    }

    /// Managed inventory scope: compute instances only.
    pub fn managed_instances() -> Self {
        Self::new().with(RESOURCE_TYPE_FILTER, [EC2_RESOURCE_TYPE])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `value` satisfies every filter keyed by `name`.
    ///
    /// A key with no filter allows everything.
    pub fn allows(&self, name: &str, value: &str) -> bool {
        self.0
            .iter()
            .filter(|filter| filter.name == name)
            .all(|filter| filter.values.iter().any(|allowed| allowed == value))
    }
}

/// Format every identifier of a given kind must follow, e.g. `i-` followed by
/// hex digits. Used to keep hybrid or foreign identifiers (`mi-…`) out of a
/// comparison set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdFormat {
    prefix: String,
}

impl InstanceIdFormat {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn matches(&self, id: &str) -> bool {
        match id.strip_prefix(self.prefix.as_str()) {
            Some(rest) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_hexdigit()),
            None => false,
        }
    }
}

impl Default for InstanceIdFormat {
    fn default() -> Self {
        Self::with_prefix("i-")
    }
}
