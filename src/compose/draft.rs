use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult, ComposeError};
use crate::model::{Architecture, RunRole, TestRun, zero_time};

use super::sweep::SweepMode;

/// A float-typed draft field as the operator typed it. Kept as text
/// until estimate/submit time so partial input ("0.", "1e") never
/// destroys what was entered; coercion failures surface as validation
/// faults instead of silent zeroes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatInput(String);

impl FloatInput {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    #[must_use]
    pub fn from_value(value: f64) -> Self {
        Self(format_float(value))
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.0
    }

    /// # Errors
    ///
    /// Returns a validation fault naming `field` when the text does not
    /// parse as a number.
    pub fn parse(&self, field: &'static str) -> AppResult<f64> {
        self.0.trim().parse::<f64>().map_err(|err| {
            tracing::debug!("Rejecting {} = {:?}: {}", field, self.0, err);
            AppError::compose(ComposeError::InvalidFloatField {
                field,
                value: self.0.clone(),
            })
        })
    }

    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.0.trim().parse::<f64>().ok()
    }
}

impl Default for FloatInput {
    fn default() -> Self {
        Self("0".to_owned())
    }
}

fn format_float(value: f64) -> String {
    // Integral values render without the trailing ".0" the operator
    // never typed.
    if value.fract().abs() < f64::EPSILON && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// One typed value for a declared run field. The parameter form is
/// stringly typed at the edge; this is the narrow waist it passes
/// through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    fn as_int(&self) -> i64 {
        match self {
            FieldValue::Int(value) => *value,
            FieldValue::Bool(value) => i64::from(*value),
            FieldValue::Text(text) => text.trim().parse().unwrap_or(0),
        }
    }

    fn as_bool(&self) -> bool {
        match self {
            FieldValue::Int(value) => *value != 0,
            FieldValue::Bool(value) => *value,
            FieldValue::Text(text) => text.trim().eq_ignore_ascii_case("true"),
        }
    }

    fn as_text(&self) -> String {
        match self {
            FieldValue::Int(value) => value.to_string(),
            FieldValue::Bool(value) => value.to_string(),
            FieldValue::Text(text) => text.clone(),
        }
    }

    fn as_float_input(&self) -> FloatInput {
        match self {
            FieldValue::Int(value) => FloatInput::from_value(*value as f64),
            FieldValue::Bool(value) => FloatInput::from_value(f64::from(i8::from(*value))),
            FieldValue::Text(text) => FloatInput::new(text.clone()),
        }
    }
}

/// Draft fields that can seed a parameter sweep: every scalar with a
/// numeric current value.
pub const NUMERIC_FIELDS: [&str; 18] = [
    "sampleCount",
    "batchSize",
    "windowSize",
    "loadGenThreads",
    "loadGenInputCount",
    "loadGenOutputCount",
    "loadGenTPSStepTime",
    "trimSamplesAtStart",
    "preseedCount",
    "repeat",
    "maxRetries",
    "priority",
    "invalidTxRate",
    "fixedTxRate",
    "contentionRate",
    "loadGenTPSTarget",
    "loadGenTPSStepStart",
    "loadGenTPSStepPercent",
];

/// The in-progress configuration for a not-yet-submitted run. Mutated
/// only through the composer transitions; the initial state is the
/// selected architecture's declared default composition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunDraft {
    pub commit_hash: String,
    pub architecture_id: String,
    pub log_level: String,
    pub not_before: Option<DateTime<Utc>>,

    pub sample_count: i64,
    pub batch_size: i64,
    pub window_size: i64,
    pub load_gen_threads: i64,
    pub load_gen_input_count: i64,
    pub load_gen_output_count: i64,
    pub load_gen_tps_step_time: i64,
    pub trim_samples_at_start: i64,
    pub preseed_count: i64,
    pub repeat: i64,
    pub max_retries: i64,
    pub priority: i64,

    pub trim_zeroes_at_start: bool,
    pub trim_zeroes_at_end: bool,
    pub preseed_shards: bool,
    pub run_perf: bool,
    pub retry_on_failure: bool,

    pub invalid_tx_rate: FloatInput,
    pub fixed_tx_rate: FloatInput,
    pub contention_rate: FloatInput,
    pub load_gen_tps_target: FloatInput,
    pub load_gen_tps_step_start: FloatInput,
    pub load_gen_tps_step_percent: FloatInput,

    pub roles: Vec<RunRole>,
    pub sweep_roles: Vec<RunRole>,

    pub sweep: SweepMode,
    pub sweep_one_at_a_time: bool,
    pub sweep_parameter_param: String,
    pub sweep_parameter_start: FloatInput,
    pub sweep_parameter_stop: FloatInput,
    pub sweep_parameter_increment: FloatInput,
    pub sweep_time_runs: i64,
    pub sweep_time_minutes: i64,
    pub sweep_role_runs: i64,
}

impl RunDraft {
    /// Seeds a draft from an existing run record: an architecture's
    /// declared default, or a finished run being rescheduled. Existing
    /// agent bindings are dropped (those agents are long gone); launch
    /// template references and failure specs survive.
    #[must_use]
    pub fn from_run(run: &TestRun) -> Self {
        let strip_agent = |role: &RunRole| {
            let mut role = role.clone();
            role.agent_id = None;
            role
        };
        Self {
            commit_hash: run.commit_hash.clone(),
            architecture_id: run.architecture_id.clone(),
            log_level: run.log_level.clone(),
            not_before: None,
            sample_count: run.sample_count,
            batch_size: run.batch_size,
            window_size: run.window_size,
            load_gen_threads: run.load_gen_threads,
            load_gen_input_count: run.load_gen_input_count,
            load_gen_output_count: run.load_gen_output_count,
            load_gen_tps_step_time: run.load_gen_tps_step_time,
            trim_samples_at_start: run.trim_samples_at_start,
            preseed_count: run.preseed_count,
            repeat: run.repeat,
            max_retries: run.max_retries,
            priority: run.priority,
            trim_zeroes_at_start: run.trim_zeroes_at_start,
            trim_zeroes_at_end: run.trim_zeroes_at_end,
            preseed_shards: run.preseed_shards,
            run_perf: run.run_perf,
            retry_on_failure: run.retry_on_failure,
            invalid_tx_rate: FloatInput::from_value(run.invalid_tx_rate),
            fixed_tx_rate: FloatInput::from_value(run.fixed_tx_rate),
            contention_rate: FloatInput::from_value(run.contention_rate),
            load_gen_tps_target: FloatInput::from_value(run.load_gen_tps_target),
            load_gen_tps_step_start: FloatInput::from_value(run.load_gen_tps_step_start),
            load_gen_tps_step_percent: FloatInput::from_value(run.load_gen_tps_step_percent),
            roles: run.roles.iter().map(strip_agent).collect(),
            sweep_roles: run.sweep_roles.iter().map(strip_agent).collect(),
            sweep: SweepMode::from_tag(&run.sweep),
            sweep_one_at_a_time: run.sweep_one_at_a_time,
            sweep_parameter_param: run.sweep_parameter.clone(),
            sweep_parameter_start: FloatInput::from_value(run.sweep_parameter_start),
            sweep_parameter_stop: FloatInput::from_value(run.sweep_parameter_stop),
            sweep_parameter_increment: FloatInput::from_value(run.sweep_parameter_increment),
            sweep_time_runs: run.sweep_time_runs,
            sweep_time_minutes: run.sweep_time_minutes,
            sweep_role_runs: run.sweep_role_runs,
        }
    }

    /// Assigns one top-level field by its declared name. Changing the
    /// architecture selector resets the whole draft to the new
    /// architecture's default composition, because roles (and sweep
    /// roles) are architecture-specific.
    ///
    /// # Errors
    ///
    /// Returns a validation fault for an unknown field name or an
    /// unknown architecture id; the draft is left unchanged.
    pub fn set_scalar(
        &mut self,
        field: &str,
        value: &FieldValue,
        architectures: &[Architecture],
    ) -> AppResult<()> {
        match field {
            "commitHash" => self.commit_hash = value.as_text(),
            "architectureID" => {
                let id = value.as_text();
                if id != self.architecture_id {
                    let arch = architectures.iter().find(|arch| arch.id == id).ok_or_else(
                        || AppError::compose(ComposeError::UnknownArchitecture { id: id.clone() }),
                    )?;
                    *self = Self::from_run(&arch.default_test);
                }
                self.architecture_id = id;
            }
            "logLevel" => self.log_level = value.as_text(),
            "sampleCount" => self.sample_count = value.as_int(),
            "batchSize" => self.batch_size = value.as_int(),
            "windowSize" => self.window_size = value.as_int(),
            "loadGenThreads" => self.load_gen_threads = value.as_int(),
            "loadGenInputCount" => self.load_gen_input_count = value.as_int(),
            "loadGenOutputCount" => self.load_gen_output_count = value.as_int(),
            "loadGenTPSStepTime" => self.load_gen_tps_step_time = value.as_int(),
            "trimSamplesAtStart" => self.trim_samples_at_start = value.as_int(),
            "preseedCount" => self.preseed_count = value.as_int(),
            "repeat" => self.repeat = value.as_int(),
            "maxRetries" => self.max_retries = value.as_int(),
            "priority" => self.priority = value.as_int(),
            "trimZeroesAtStart" => self.trim_zeroes_at_start = value.as_bool(),
            "trimZeroesAtEnd" => self.trim_zeroes_at_end = value.as_bool(),
            "preseedShards" => self.preseed_shards = value.as_bool(),
            "runPerf" => self.run_perf = value.as_bool(),
            "retryOnFailure" => self.retry_on_failure = value.as_bool(),
            "sweepOneAtATime" => self.sweep_one_at_a_time = value.as_bool(),
            "invalidTxRate" => self.invalid_tx_rate = value.as_float_input(),
            "fixedTxRate" => self.fixed_tx_rate = value.as_float_input(),
            "contentionRate" => self.contention_rate = value.as_float_input(),
            "loadGenTPSTarget" => self.load_gen_tps_target = value.as_float_input(),
            "loadGenTPSStepStart" => self.load_gen_tps_step_start = value.as_float_input(),
            "loadGenTPSStepPercent" => self.load_gen_tps_step_percent = value.as_float_input(),
            "sweep" => self.sweep = SweepMode::from_tag(&value.as_text()),
            "sweepParameterParam" => self.sweep_parameter_param = value.as_text(),
            "sweepParameterStart" => self.sweep_parameter_start = value.as_float_input(),
            "sweepParameterStop" => self.sweep_parameter_stop = value.as_float_input(),
            "sweepParameterIncrement" => self.sweep_parameter_increment = value.as_float_input(),
            "sweepTimeRuns" => self.sweep_time_runs = value.as_int(),
            "sweepTimeMinutes" => self.sweep_time_minutes = value.as_int(),
            "sweepRoleRuns" => self.sweep_role_runs = value.as_int(),
            unknown => {
                return Err(AppError::compose(ComposeError::UnknownField {
                    field: unknown.to_owned(),
                }));
            }
        }
        Ok(())
    }

    /// Current numeric value of a field, for seeding parameter sweeps.
    #[must_use]
    pub fn numeric_value(&self, field: &str) -> Option<f64> {
        match field {
            "sampleCount" => Some(self.sample_count as f64),
            "batchSize" => Some(self.batch_size as f64),
            "windowSize" => Some(self.window_size as f64),
            "loadGenThreads" => Some(self.load_gen_threads as f64),
            "loadGenInputCount" => Some(self.load_gen_input_count as f64),
            "loadGenOutputCount" => Some(self.load_gen_output_count as f64),
            "loadGenTPSStepTime" => Some(self.load_gen_tps_step_time as f64),
            "trimSamplesAtStart" => Some(self.trim_samples_at_start as f64),
            "preseedCount" => Some(self.preseed_count as f64),
            "repeat" => Some(self.repeat as f64),
            "maxRetries" => Some(self.max_retries as f64),
            "priority" => Some(self.priority as f64),
            "invalidTxRate" => self.invalid_tx_rate.value(),
            "fixedTxRate" => self.fixed_tx_rate.value(),
            "contentionRate" => self.contention_rate.value(),
            "loadGenTPSTarget" => self.load_gen_tps_target.value(),
            "loadGenTPSStepStart" => self.load_gen_tps_step_start.value(),
            "loadGenTPSStepPercent" => self.load_gen_tps_step_percent.value(),
            _ => None,
        }
    }

    /// Coerces the draft into the wire shape the controller schedules
    /// and estimates from.
    ///
    /// # Errors
    ///
    /// Returns a validation fault when a float-typed field does not
    /// parse; nothing is sent in that case.
    pub fn to_run(&self) -> AppResult<TestRun> {
        Ok(TestRun {
            commit_hash: self.commit_hash.clone(),
            architecture_id: self.architecture_id.clone(),
            log_level: self.log_level.clone(),
            not_before: self.not_before.unwrap_or_else(zero_time),
            sample_count: self.sample_count,
            batch_size: self.batch_size,
            window_size: self.window_size,
            load_gen_threads: self.load_gen_threads,
            load_gen_input_count: self.load_gen_input_count,
            load_gen_output_count: self.load_gen_output_count,
            load_gen_tps_step_time: self.load_gen_tps_step_time,
            trim_samples_at_start: self.trim_samples_at_start,
            preseed_count: self.preseed_count,
            repeat: self.repeat,
            max_retries: self.max_retries,
            priority: self.priority,
            trim_zeroes_at_start: self.trim_zeroes_at_start,
            trim_zeroes_at_end: self.trim_zeroes_at_end,
            preseed_shards: self.preseed_shards,
            run_perf: self.run_perf,
            retry_on_failure: self.retry_on_failure,
            invalid_tx_rate: self.invalid_tx_rate.parse("invalidTxRate")?,
            fixed_tx_rate: self.fixed_tx_rate.parse("fixedTxRate")?,
            contention_rate: self.contention_rate.parse("contentionRate")?,
            load_gen_tps_target: self.load_gen_tps_target.parse("loadGenTPSTarget")?,
            load_gen_tps_step_start: self.load_gen_tps_step_start.parse("loadGenTPSStepStart")?,
            load_gen_tps_step_percent: self
                .load_gen_tps_step_percent
                .parse("loadGenTPSStepPercent")?,
            roles: self.roles.clone(),
            sweep_roles: self.sweep_roles.clone(),
            sweep: self.sweep.as_tag().to_owned(),
            sweep_one_at_a_time: self.sweep_one_at_a_time,
            sweep_parameter: self.sweep_parameter_param.clone(),
            sweep_parameter_start: self.sweep_parameter_start.parse("sweepParameterStart")?,
            sweep_parameter_stop: self.sweep_parameter_stop.parse("sweepParameterStop")?,
            sweep_parameter_increment: self
                .sweep_parameter_increment
                .parse("sweepParameterIncrement")?,
            sweep_time_runs: self.sweep_time_runs,
            sweep_time_minutes: self.sweep_time_minutes,
            sweep_role_runs: self.sweep_role_runs,
            ..TestRun::default()
        })
    }
}
