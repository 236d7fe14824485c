use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, ChannelError};
use crate::model::{ControllerConfig, ExecutedCommand, RunRole, RunStatus, TestResult, TestRun};

/// Envelope for every message pushed by the controller. The payload is
/// decoded per type; unknown types are skipped, not errors, so the
/// controller can grow its vocabulary without breaking older consoles.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// The closed union of controller events this console understands.
/// Everything downstream of the router consumes only this type, never
/// raw maps.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    MaintenanceModeChanged(MaintenancePayload),
    ControllerConfigUpdated(ConfigPayload),
    AgentCountChanged(CountPayload),
    RunCreated(Box<RunCreatedPayload>),
    SystemStateChanged(SystemStatePayload),
    RunStatusChanged(RunStatusPayload),
    RunTrimParametersChanged(RunTrimPayload),
    RunRolesChanged(RunRolesPayload),
    RunResultAvailable(RunResultPayload),
    RunLogAppended(RunLogPayload),
    RedownloadComplete(RedownloadPayload),
    RunExecutedCommandAdded(RunCommandPayload),
    ConnectedUsersChanged(CountPayload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenancePayload {
    #[serde(default)]
    pub maintenance_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ConfigPayload {
    #[serde(default)]
    pub config: ControllerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CountPayload {
    #[serde(default)]
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunCreatedPayload {
    pub data: TestRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SystemStatePayload {
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatusPayload {
    #[serde(rename = "testRunID")]
    pub test_run_id: String,
    pub status: RunStatus,
    #[serde(default = "crate::model::zero_time")]
    pub started: DateTime<Utc>,
    #[serde(default = "crate::model::zero_time")]
    pub completed: DateTime<Utc>,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunTrimPayload {
    #[serde(rename = "testRunID")]
    pub test_run_id: String,
    #[serde(rename = "trimZeroes", default)]
    pub trim_zeroes_at_start: bool,
    #[serde(rename = "trimZeroesEnd", default)]
    pub trim_zeroes_at_end: bool,
    #[serde(rename = "trimSamples", default)]
    pub trim_samples_at_start: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunRolesPayload {
    #[serde(rename = "testRunID")]
    pub test_run_id: String,
    #[serde(default)]
    pub roles: Vec<RunRole>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunResultPayload {
    #[serde(rename = "testRunID")]
    pub test_run_id: String,
    #[serde(default)]
    pub result: Option<TestResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunLogPayload {
    pub id: String,
    #[serde(default)]
    pub log: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RedownloadPayload {
    #[serde(rename = "testRunID")]
    pub test_run_id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunCommandPayload {
    #[serde(rename = "testRunID")]
    pub test_run_id: String,
    pub details: ExecutedCommand,
}

impl ServerEvent {
    /// Decodes one wire frame. Returns `Ok(None)` for message types this
    /// console does not recognize.
    ///
    /// # Errors
    ///
    /// Returns an error when the frame is not a valid envelope or a
    /// recognized type carries a malformed payload.
    pub fn decode(frame: &str) -> AppResult<Option<Self>> {
        let envelope: Envelope = serde_json::from_str(frame).map_err(|err| {
            AppError::channel(ChannelError::Deserialize {
                context: "event envelope",
                source: err,
            })
        })?;
        let payload = envelope.payload;
        let event = match envelope.kind.as_str() {
            "maintenanceModeChanged" => {
                Some(ServerEvent::MaintenanceModeChanged(decode_payload(payload)?))
            }
            "testRunManagerConfigUpdated" => {
                Some(ServerEvent::ControllerConfigUpdated(decode_payload(payload)?))
            }
            "agentCountChanged" => Some(ServerEvent::AgentCountChanged(decode_payload(payload)?)),
            "testRunCreated" => Some(ServerEvent::RunCreated(Box::new(decode_payload(payload)?))),
            "systemStateChange" => Some(ServerEvent::SystemStateChanged(decode_payload(payload)?)),
            "testRunStatusChanged" => Some(ServerEvent::RunStatusChanged(decode_payload(payload)?)),
            "testRunTrimParametersChange" => {
                Some(ServerEvent::RunTrimParametersChanged(decode_payload(payload)?))
            }
            "testRunRolesChanged" => Some(ServerEvent::RunRolesChanged(decode_payload(payload)?)),
            "testRunResultAvailable" => {
                Some(ServerEvent::RunResultAvailable(decode_payload(payload)?))
            }
            "testRunLogAppended" => Some(ServerEvent::RunLogAppended(decode_payload(payload)?)),
            "redownloadComplete" => Some(ServerEvent::RedownloadComplete(decode_payload(payload)?)),
            "testRunExecutedCommandAdded" => {
                Some(ServerEvent::RunExecutedCommandAdded(decode_payload(payload)?))
            }
            "connectedUsersChanged" => {
                Some(ServerEvent::ConnectedUsersChanged(decode_payload(payload)?))
            }
            _ => None,
        };
        Ok(event)
    }
}

fn decode_payload<T>(payload: serde_json::Value) -> AppResult<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(payload).map_err(|err| {
        AppError::channel(ChannelError::Deserialize {
            context: "event payload",
            source: err,
        })
    })
}

/// Commands the console sends upstream over the live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "t", content = "m")]
pub enum ClientCommand {
    #[serde(rename = "subscribeTestRunLog")]
    SubscribeRunLog { id: String },
    #[serde(rename = "unsubscribeTestRunLog")]
    UnsubscribeRunLog {},
}

impl ClientCommand {
    /// # Errors
    ///
    /// Returns an error when the command cannot be serialized.
    pub fn encode(&self) -> AppResult<String> {
        serde_json::to_string(self).map_err(|err| {
            AppError::channel(ChannelError::Serialize {
                context: "client command",
                source: err,
            })
        })
    }
}
