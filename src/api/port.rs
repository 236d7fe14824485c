use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::model::{InitialState, TestRun};

/// A one-time websocket connection grant: a complete endpoint URL with
/// an embedded token, valid for one connection attempt within a short
/// expiry window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WsToken {
    pub target: String,
}

/// The controller acknowledges state-changing requests with an `ok`
/// flag rather than a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub struct OkResponse {
    #[serde(default)]
    pub ok: bool,
}

/// Instance-hour projection for a draft, keyed by instance type. Used
/// for operator confirmation only, never for billing.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Estimate {
    pub testruns: i64,
    pub instance_hours: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct TrimParameters {
    #[serde(rename = "trimZeroes")]
    pub trim_zeroes_at_start: bool,
    #[serde(rename = "trimZeroesEnd")]
    pub trim_zeroes_at_end: bool,
    #[serde(rename = "trimSamples")]
    pub trim_samples_at_start: i64,
}

/// Every one-shot verb the console issues against the controller. The
/// live channel is deliberately not part of this trait; it only ever
/// consumes `ws_token`.
#[async_trait]
pub trait ControllerApi {
    /// # Errors
    /// Returns an error when the request fails or the response cannot
    /// be decoded.
    async fn ws_token(&self) -> AppResult<WsToken>;

    /// # Errors
    /// Returns an error when the request fails or the response cannot
    /// be decoded.
    async fn initial_state(&self) -> AppResult<InitialState>;

    /// # Errors
    /// Returns an error when the request fails or the response cannot
    /// be decoded.
    async fn run_details(&self, id: &str) -> AppResult<TestRun>;

    /// # Errors
    /// Returns an error when the request fails or the response cannot
    /// be decoded.
    async fn schedule_run(&self, run: &TestRun) -> AppResult<OkResponse>;

    /// # Errors
    /// Returns an error when the request fails or the response cannot
    /// be decoded.
    async fn estimate_run(&self, run: &TestRun) -> AppResult<Estimate>;

    /// # Errors
    /// Returns an error when the request fails.
    async fn terminate_run(&self, id: &str) -> AppResult<OkResponse>;

    /// # Errors
    /// Returns an error when the request fails.
    async fn retry_spawn(&self, id: &str) -> AppResult<OkResponse>;

    /// # Errors
    /// Returns an error when the request fails.
    async fn redownload_outputs(&self, id: &str) -> AppResult<OkResponse>;

    /// # Errors
    /// Returns an error when the request fails.
    async fn recalculate_results(&self, id: &str, trim: &TrimParameters) -> AppResult<OkResponse>;

    /// # Errors
    /// Returns an error when the request fails.
    async fn cancel_sweep(&self, id: &str) -> AppResult<OkResponse>;

    /// # Errors
    /// Returns an error when the request fails.
    async fn continue_sweep(&self, id: &str) -> AppResult<OkResponse>;

    /// # Errors
    /// Returns an error when the request fails.
    async fn schedule_missing_sweep_runs(&self, id: &str) -> AppResult<OkResponse>;

    /// # Errors
    /// Returns an error when the request fails.
    async fn set_max_agents(&self, max: i64) -> AppResult<()>;

    /// # Errors
    /// Returns an error when the request fails.
    async fn toggle_maintenance(&self) -> AppResult<()>;
}
