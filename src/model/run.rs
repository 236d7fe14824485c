use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The controller serializes "not yet set" timestamps as year-0001
/// values. Treat anything in year 1 or earlier as unset.
#[must_use]
pub fn zero_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

#[must_use]
pub fn is_unset(ts: &DateTime<Utc>) -> bool {
    ts.year() <= 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RunStatus {
    #[default]
    Unknown,
    Queued,
    Running,
    Completed,
    Failed,
    Aborted,
    Canceled,
    Interrupted,
}

impl RunStatus {
    /// Statuses grouped under the "failed" view: every terminal state
    /// other than a clean completion.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::Aborted | RunStatus::Canceled | RunStatus::Interrupted
        )
    }
}

/// One role instance inside a run: a role tag, a dense zero-based index
/// within that tag, and the agent binding. The binding is either an
/// existing agent id or a launch-template reference with its inferred
/// region, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RunRole {
    pub role: String,
    #[serde(rename = "roleIdx")]
    pub index: usize,
    #[serde(rename = "agentID")]
    pub agent_id: Option<i32>,
    #[serde(rename = "launchTemplateID")]
    pub launch_template_id: Option<String>,
    pub region: Option<String>,
    pub failure: Option<RoleFailure>,
}

impl RunRole {
    #[must_use]
    pub fn unassigned(role: &str, index: usize) -> Self {
        Self {
            role: role.to_owned(),
            index,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_existing_agent(role: &str, index: usize, agent_id: i32) -> Self {
        Self {
            role: role.to_owned(),
            index,
            agent_id: Some(agent_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_launch_template(role: &str, index: usize, template_id: &str, region: &str) -> Self {
        Self {
            role: role.to_owned(),
            index,
            launch_template_id: Some(template_id.to_owned()),
            region: Some(region.to_owned()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFailure {
    #[serde(rename = "after")]
    pub after_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentile {
    pub bucket: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TestResult {
    pub throughput_avg: f64,
    pub throughput_std: f64,
    pub throughput_min: f64,
    pub throughput_max: f64,
    pub throughput_percentiles: Vec<Percentile>,
    pub latency_avg: f64,
    pub latency_std: f64,
    pub latency_min: f64,
    pub latency_max: f64,
    pub latency_percentiles: Vec<Percentile>,
}

impl TestResult {
    /// The 99th-percentile latency bucket, if the controller reported
    /// one.
    #[must_use]
    pub fn tail_latency(&self) -> Option<f64> {
        self.latency_percentiles
            .iter()
            .find(|p| (p.bucket - 99.0).abs() < f64::EPSILON)
            .map(|p| p.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutedCommand {
    pub command: String,
    pub params: Vec<String>,
    #[serde(rename = "agentID")]
    pub agent_id: i32,
    #[serde(rename = "commandID")]
    pub command_id: String,
    #[serde(default = "zero_time")]
    pub started: DateTime<Utc>,
}

/// A test run as tracked by the entity store. Created by a push event or
/// a one-shot fetch, then mutated only through partial-field patches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestRun {
    pub id: String,
    #[serde(rename = "createdByuserThumbprint")]
    pub created_by: String,
    pub created: DateTime<Utc>,
    pub started: DateTime<Utc>,
    pub completed: DateTime<Utc>,
    pub not_before: DateTime<Utc>,
    pub status: RunStatus,
    pub commit_hash: String,
    #[serde(rename = "architectureID")]
    pub architecture_id: String,
    pub details: String,
    pub priority: i64,

    pub sweep: String,
    #[serde(rename = "sweepID")]
    pub sweep_id: String,
    pub sweep_one_at_a_time: bool,
    #[serde(rename = "sweepParameterParam")]
    pub sweep_parameter: String,
    pub sweep_parameter_start: f64,
    pub sweep_parameter_stop: f64,
    pub sweep_parameter_increment: f64,
    pub sweep_time_runs: i64,
    pub sweep_time_minutes: i64,
    pub sweep_role_runs: i64,
    pub sweep_roles: Vec<RunRole>,

    pub sample_count: i64,
    pub batch_size: i64,
    pub window_size: i64,
    pub log_level: String,
    pub load_gen_threads: i64,
    pub load_gen_input_count: i64,
    pub load_gen_output_count: i64,
    pub invalid_tx_rate: f64,
    pub fixed_tx_rate: f64,
    pub contention_rate: f64,
    pub preseed_count: i64,
    pub preseed_shards: bool,
    pub run_perf: bool,
    pub retry_on_failure: bool,
    pub max_retries: i64,
    pub repeat: i64,
    pub trim_samples_at_start: i64,
    pub trim_zeroes_at_start: bool,
    pub trim_zeroes_at_end: bool,

    #[serde(rename = "loadGenTPSTarget")]
    pub load_gen_tps_target: f64,
    /// Peak-finding phase marker: 0 for the first estimation run, a
    /// fraction for the second, exactly 1 for confirmation runs.
    #[serde(rename = "loadGenTPSStepStart")]
    pub load_gen_tps_step_start: f64,
    #[serde(rename = "loadGenTPSStepPercent")]
    pub load_gen_tps_step_percent: f64,
    #[serde(rename = "loadGenTPSStepTime")]
    pub load_gen_tps_step_time: i64,
    pub observed_peak: f64,

    pub roles: Vec<RunRole>,
    pub executed_commands: Vec<ExecutedCommand>,
    pub result: Option<TestResult>,
    pub avg_throughput: f64,
    pub tail_latency: f64,

    #[serde(skip)]
    pub details_loading: bool,
    #[serde(skip)]
    pub details_available: bool,
}

impl Default for TestRun {
    fn default() -> Self {
        Self {
            id: String::new(),
            created_by: String::new(),
            created: zero_time(),
            started: zero_time(),
            completed: zero_time(),
            not_before: zero_time(),
            status: RunStatus::Unknown,
            commit_hash: String::new(),
            architecture_id: String::new(),
            details: String::new(),
            priority: 0,
            sweep: String::new(),
            sweep_id: String::new(),
            sweep_one_at_a_time: false,
            sweep_parameter: String::new(),
            sweep_parameter_start: 0.0,
            sweep_parameter_stop: 0.0,
            sweep_parameter_increment: 0.0,
            sweep_time_runs: 0,
            sweep_time_minutes: 0,
            sweep_role_runs: 0,
            sweep_roles: Vec::new(),
            sample_count: 0,
            batch_size: 0,
            window_size: 0,
            log_level: String::new(),
            load_gen_threads: 0,
            load_gen_input_count: 0,
            load_gen_output_count: 0,
            invalid_tx_rate: 0.0,
            fixed_tx_rate: 0.0,
            contention_rate: 0.0,
            preseed_count: 0,
            preseed_shards: false,
            run_perf: false,
            retry_on_failure: false,
            max_retries: 0,
            repeat: 0,
            trim_samples_at_start: 0,
            trim_zeroes_at_start: false,
            trim_zeroes_at_end: false,
            load_gen_tps_target: 0.0,
            load_gen_tps_step_start: 0.0,
            load_gen_tps_step_percent: 0.0,
            load_gen_tps_step_time: 0,
            observed_peak: 0.0,
            roles: Vec::new(),
            executed_commands: Vec::new(),
            result: None,
            avg_throughput: -1.0,
            tail_latency: -1.0,
            details_loading: false,
            details_available: false,
        }
    }
}

impl TestRun {
    /// The timestamp used to order terminal runs: completion when set,
    /// otherwise the not-before gate, otherwise creation.
    #[must_use]
    pub fn sort_date(&self) -> DateTime<Utc> {
        if !is_unset(&self.completed) {
            return self.completed;
        }
        if !is_unset(&self.not_before) {
            return self.not_before;
        }
        self.created
    }
}

/// A typed partial update for one run. `None` fields are left untouched
/// on merge; `result` distinguishes omission (`None`) from an explicit
/// clear (`Some(None)`, used when a result recalculation is requested).
#[derive(Debug, Clone, Default)]
pub struct RunPatch {
    pub id: String,
    pub status: Option<RunStatus>,
    pub started: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    pub details: Option<String>,
    pub trim_zeroes_at_start: Option<bool>,
    pub trim_zeroes_at_end: Option<bool>,
    pub trim_samples_at_start: Option<i64>,
    pub roles: Option<Vec<RunRole>>,
    pub observed_peak: Option<f64>,
    pub result: Option<Option<TestResult>>,
    pub avg_throughput: Option<f64>,
    pub tail_latency: Option<f64>,
}

impl RunPatch {
    #[must_use]
    pub fn for_run(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            ..Self::default()
        }
    }

    /// Merges this patch onto `run`, field by field. Unspecified fields
    /// are never modified and nothing is ever removed.
    pub fn apply_to(&self, run: &mut TestRun) {
        if let Some(status) = self.status {
            run.status = status;
        }
        if let Some(started) = self.started {
            run.started = started;
        }
        if let Some(completed) = self.completed {
            run.completed = completed;
        }
        if let Some(details) = self.details.as_ref() {
            run.details = details.clone();
        }
        if let Some(trim) = self.trim_zeroes_at_start {
            run.trim_zeroes_at_start = trim;
        }
        if let Some(trim) = self.trim_zeroes_at_end {
            run.trim_zeroes_at_end = trim;
        }
        if let Some(trim) = self.trim_samples_at_start {
            run.trim_samples_at_start = trim;
        }
        if let Some(roles) = self.roles.as_ref() {
            run.roles = roles.clone();
        }
        if let Some(peak) = self.observed_peak {
            run.observed_peak = peak;
        }
        if let Some(result) = self.result.as_ref() {
            run.result = result.clone();
        }
        if let Some(avg) = self.avg_throughput {
            run.avg_throughput = avg;
        }
        if let Some(tail) = self.tail_latency {
            run.tail_latency = tail;
        }
    }
}
