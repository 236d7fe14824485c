use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::run::TestRun;
use super::sweep::Sweep;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchitectureRole {
    pub role: String,
    pub title: String,
    pub short_title: String,
}

/// A deployable system layout. Roles are architecture-specific, which is
/// why switching the draft's architecture resets its role composition to
/// the declared default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Architecture {
    pub id: String,
    pub name: String,
    pub roles: Vec<ArchitectureRole>,
    #[serde(rename = "defaultTest")]
    pub default_test: TestRun,
}

impl Architecture {
    #[must_use]
    pub fn role_spec(&self, role: &str) -> Option<&ArchitectureRole> {
        self.roles.iter().find(|r| r.role == role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchTemplate {
    pub id: String,
    pub description: String,
    pub region: String,
    pub instance_type: String,
    #[serde(rename = "vCPU")]
    pub vcpu: String,
    pub ram: String,
    pub bandwidth: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Commit {
    pub commit: String,
    pub subject: String,
    pub author: CommitAuthor,
    #[serde(default = "super::run::zero_time")]
    pub committed: DateTime<Utc>,
}

impl Default for Commit {
    fn default() -> Self {
        Self {
            commit: String::new(),
            subject: String::new(),
            author: CommitAuthor::default(),
            committed: super::run::zero_time(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct User {
    #[serde(rename = "thumbPrint")]
    pub thumbprint: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    pub max_agents: i64,
}

/// Input widget type for one declared test-run parameter. The parameter
/// form is rendered generically from these specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FieldType {
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "bool")]
    Bool,
    #[default]
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "loglevel")]
    LogLevel,
    #[serde(rename = "commit")]
    Commit,
    #[serde(rename = "arch")]
    Architecture,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RunFieldSpec {
    pub name: String,
    pub title: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Full-state snapshot fetched once the controller reports it is
/// running. Applying it replaces every reference list wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct InitialState {
    pub commits: Vec<Commit>,
    pub agent_count: i64,
    pub launch_templates: Vec<LaunchTemplate>,
    pub architectures: Vec<Architecture>,
    pub version: String,
    pub maintenance: bool,
    pub config: ControllerConfig,
    pub testruns: Vec<TestRun>,
    pub me: User,
    pub users: Vec<User>,
    pub sweeps: Vec<Sweep>,
    pub online_users: i64,
    pub test_run_fields: Vec<RunFieldSpec>,
}
