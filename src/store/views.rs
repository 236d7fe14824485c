use crate::model::{RunStatus, Sweep, TestRun};

use super::state::Store;

/// Derived views over the run table. These are computed on every read
/// from current state, never cached; the store itself only holds the
/// normalized entities.
impl Store {
    #[must_use]
    pub fn active_runs(&self) -> Vec<&TestRun> {
        self.runs_by_created(|run| run.status == RunStatus::Running)
    }

    #[must_use]
    pub fn queued_runs(&self) -> Vec<&TestRun> {
        self.runs_by_created(|run| run.status == RunStatus::Queued)
    }

    #[must_use]
    pub fn completed_runs(&self) -> Vec<&TestRun> {
        self.runs_by_completed(|run| run.status == RunStatus::Completed)
    }

    #[must_use]
    pub fn failed_runs(&self) -> Vec<&TestRun> {
        self.runs_by_completed(|run| run.status.is_failure())
    }

    /// Completed peak-finding runs whose estimation phases still need a
    /// manually observed peak: not yet at the confirmation phase marker
    /// and with no peak recorded.
    #[must_use]
    pub fn pending_peak_runs(&self) -> Vec<&TestRun> {
        self.runs_by_completed(|run| {
            run.status == RunStatus::Completed
                && run.sweep == "peak"
                && (run.load_gen_tps_step_start - 1.0).abs() > f64::EPSILON
                && run.observed_peak.abs() < f64::EPSILON
        })
    }

    /// Completed members of one sweep, newest completion first.
    #[must_use]
    pub fn sweep_runs(&self, sweep_id: &str) -> Vec<&TestRun> {
        self.runs_by_completed(|run| run.status == RunStatus::Completed && run.sweep_id == sweep_id)
    }

    /// Sweeps with the most recently active first.
    #[must_use]
    pub fn sweeps(&self) -> Vec<&Sweep> {
        let mut sweeps: Vec<&Sweep> = self.sweeps_raw().iter().collect();
        sweeps.sort_by(|a, b| b.first_run.cmp(&a.first_run));
        sweeps
    }

    fn runs_by_created<TFilter>(&self, filter: TFilter) -> Vec<&TestRun>
    where
        TFilter: Fn(&TestRun) -> bool,
    {
        let mut runs: Vec<&TestRun> = self.runs().filter(|run| filter(run)).collect();
        runs.sort_by(|a, b| b.created.cmp(&a.created));
        runs
    }

    fn runs_by_completed<TFilter>(&self, filter: TFilter) -> Vec<&TestRun>
    where
        TFilter: Fn(&TestRun) -> bool,
    {
        let mut runs: Vec<&TestRun> = self.runs().filter(|run| filter(run)).collect();
        runs.sort_by(|a, b| b.sort_date().cmp(&a.sort_date()));
        runs
    }
}
