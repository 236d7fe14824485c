use tracing::debug;

use crate::channel::ServerEvent;
use crate::model::{RunPatch, RunStatus};
use crate::notify::Notice;

use super::state::Store;

/// Asynchronous follow-ups a handler requests. Handlers themselves only
/// mutate the store; the service executes effects without blocking
/// further event processing.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notice(Notice),
    /// Re-fetch the full detail record for a run, to pick up fields the
    /// push payload does not carry (executed commands in particular).
    FetchRunDetails { id: String },
    /// Load the full reference state; issued when the controller
    /// reports it has finished starting up.
    LoadInitialState,
}

/// Applies one decoded controller event to the store. Exactly one
/// handler runs per event; every handler is an idempotent patch, so a
/// duplicate delivery cannot corrupt state (log appends excepted, see
/// DESIGN.md).
pub fn route(store: &mut Store, event: ServerEvent) -> Vec<Effect> {
    let mut effects = Vec::new();
    match event {
        ServerEvent::MaintenanceModeChanged(payload) => {
            store.set_maintenance_mode(payload.maintenance_mode);
        }
        ServerEvent::ControllerConfigUpdated(payload) => {
            store.set_controller_config(payload.config);
        }
        ServerEvent::AgentCountChanged(payload) => {
            store.set_agent_count(payload.count);
        }
        ServerEvent::ConnectedUsersChanged(payload) => {
            store.set_online_users(payload.count);
        }
        ServerEvent::SystemStateChanged(payload) => {
            store.set_system_state(&payload.state);
            if payload.state == "running" {
                effects.push(Effect::LoadInitialState);
            }
        }
        ServerEvent::RunCreated(payload) => {
            store.upsert_run(payload.data);
        }
        ServerEvent::RunStatusChanged(payload) => {
            let mut patch = RunPatch::for_run(&payload.test_run_id);
            patch.status = Some(payload.status);
            patch.started = Some(payload.started);
            patch.completed = Some(payload.completed);
            patch.details = Some(payload.details.clone());
            store.patch_run(&patch);
            match payload.status {
                RunStatus::Completed => {
                    effects.push(Effect::Notice(Notice::success(format!(
                        "Test run {} completed",
                        payload.test_run_id
                    ))));
                    // The push payload has no executed-command list; the
                    // detail record does.
                    effects.push(Effect::FetchRunDetails {
                        id: payload.test_run_id,
                    });
                }
                RunStatus::Failed => {
                    effects.push(Effect::Notice(Notice::error(format!(
                        "Test run {} failed: {}",
                        payload.test_run_id, payload.details
                    ))));
                }
                RunStatus::Unknown
                | RunStatus::Queued
                | RunStatus::Running
                | RunStatus::Aborted
                | RunStatus::Canceled
                | RunStatus::Interrupted => {}
            }
        }
        ServerEvent::RunTrimParametersChanged(payload) => {
            let mut patch = RunPatch::for_run(&payload.test_run_id);
            patch.trim_zeroes_at_start = Some(payload.trim_zeroes_at_start);
            patch.trim_zeroes_at_end = Some(payload.trim_zeroes_at_end);
            patch.trim_samples_at_start = Some(payload.trim_samples_at_start);
            store.patch_run(&patch);
        }
        ServerEvent::RunRolesChanged(payload) => {
            let mut patch = RunPatch::for_run(&payload.test_run_id);
            patch.roles = Some(payload.roles);
            store.patch_run(&patch);
        }
        ServerEvent::RunResultAvailable(payload) => {
            let mut patch = RunPatch::for_run(&payload.test_run_id);
            patch.avg_throughput = Some(
                payload
                    .result
                    .as_ref()
                    .map_or(-1.0, |result| result.throughput_avg),
            );
            patch.tail_latency = Some(
                payload
                    .result
                    .as_ref()
                    .and_then(|result| result.tail_latency())
                    .unwrap_or(-1.0),
            );
            patch.result = Some(payload.result);
            store.patch_run(&patch);
        }
        ServerEvent::RunExecutedCommandAdded(payload) => {
            store.append_executed_command(&payload.test_run_id, payload.details);
        }
        ServerEvent::RunLogAppended(payload) => {
            // Advisory unsubscribe: the server may still push chunks for
            // a run we no longer watch; drop them here.
            if store.subscribed_log() == Some(payload.id.as_str()) {
                store.append_log(&payload.id, &payload.log);
            } else {
                debug!("Dropping log chunk for unsubscribed run {}", payload.id);
            }
        }
        ServerEvent::RedownloadComplete(payload) => {
            if payload.success {
                effects.push(Effect::Notice(Notice::success(format!(
                    "Redownload of test run {} outputs succeeded",
                    payload.test_run_id
                ))));
            } else {
                effects.push(Effect::Notice(Notice::error(format!(
                    "Redownload of test run {} outputs failed: {}",
                    payload.test_run_id, payload.error
                ))));
            }
        }
    }
    effects
}
