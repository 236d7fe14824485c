use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::run::{RunRole, zero_time};

/// A parameterized family of runs varying one axis: a parameter value, a
/// point in time, the role count, or the load level for peak finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sweep {
    pub id: String,
    #[serde(rename = "architectureID")]
    pub architecture_id: String,
    pub sweep_type: String,
    pub sweep_parameter: String,
    pub sweep_parameter_start: f64,
    pub sweep_parameter_stop: f64,
    pub sweep_parameter_increment: f64,
    pub sweep_role_runs: i64,
    pub sweep_roles: Vec<RunRole>,
    pub run_count: i64,
    pub first_run: DateTime<Utc>,
    pub last_run: DateTime<Utc>,
    /// Set once the member runs for this sweep have been loaded; gates
    /// the lazy fetch so a sweep's runs are requested at most once.
    #[serde(skip)]
    pub runs_available: bool,
}

impl Default for Sweep {
    fn default() -> Self {
        Self {
            id: String::new(),
            architecture_id: String::new(),
            sweep_type: String::new(),
            sweep_parameter: String::new(),
            sweep_parameter_start: 0.0,
            sweep_parameter_stop: 0.0,
            sweep_parameter_increment: 0.0,
            sweep_role_runs: 0,
            sweep_roles: Vec::new(),
            run_count: 0,
            first_run: zero_time(),
            last_run: zero_time(),
            runs_available: false,
        }
    }
}
