use std::collections::HashMap;

use tracing::debug;

use crate::channel::ConnectionPhase;
use crate::model::{
    Architecture, Commit, ControllerConfig, ExecutedCommand, InitialState, LaunchTemplate,
    RunFieldSpec, RunPatch, Sweep, TestRun, User,
};

/// Live-channel session state mirrored into the store so readers can
/// render connection status without reaching into the channel task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub phase: ConnectionPhase,
    pub retries: u32,
    /// Incremented on every successful open. Dependents watch this to
    /// detect a reconnect and re-issue channel-scoped subscriptions.
    pub connection_count: u64,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self.phase, ConnectionPhase::Connected)
    }
}

/// The single shared mutable resource of the console. All mutation
/// happens synchronously inside one event-handler invocation on the
/// service task; there is no locking because there is no preemption
/// between handler invocations.
#[derive(Debug, Default)]
pub struct Store {
    runs: HashMap<String, TestRun>,
    logs: HashMap<String, String>,
    subscribed_log: Option<String>,

    architectures: Vec<Architecture>,
    launch_templates: Vec<LaunchTemplate>,
    commits: Vec<Commit>,
    users: Vec<User>,
    sweeps: Vec<Sweep>,
    run_fields: Vec<RunFieldSpec>,
    me: User,

    version: String,
    maintenance_mode: bool,
    system_state: String,
    controller_config: ControllerConfig,
    agent_count: i64,
    online_users: i64,
    initial_state_loaded: bool,

    connection: ConnectionState,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the full reference model from a one-shot state load.
    /// This is the only place reference lists are (re)written; push
    /// events never touch them.
    pub fn apply_initial_state(&mut self, state: InitialState) {
        self.commits = state.commits;
        self.agent_count = state.agent_count;
        self.launch_templates = state.launch_templates;
        self.architectures = state.architectures;
        self.version = state.version;
        self.maintenance_mode = state.maintenance;
        self.controller_config = state.config;
        self.me = state.me;
        self.users = state.users;
        self.sweeps = state.sweeps;
        self.online_users = state.online_users;
        self.run_fields = state.test_run_fields;
        self.runs = state
            .testruns
            .into_iter()
            .filter(|run| !run.id.is_empty())
            .map(|run| (run.id.clone(), run))
            .collect();
        self.initial_state_loaded = true;
    }

    /// Inserts a newly announced run. Re-delivery of the same
    /// announcement is ignored so a duplicate push cannot revert fields
    /// that later patches already advanced.
    pub fn upsert_run(&mut self, run: TestRun) {
        if run.id.is_empty() {
            debug!("Dropping run announcement without an id");
            return;
        }
        if self.runs.contains_key(&run.id) {
            debug!("Run {} already known, keeping existing entry", run.id);
            return;
        }
        self.runs.insert(run.id.clone(), run);
    }

    /// Merges a partial update onto a known run. Returns false (and
    /// stores nothing) when the run is unknown: creation happens only
    /// via [`Store::upsert_run`] or a detail fetch.
    pub fn patch_run(&mut self, patch: &RunPatch) -> bool {
        let Some(run) = self.runs.get_mut(&patch.id) else {
            debug!("Dropping patch for unknown run {}", patch.id);
            return false;
        };
        patch.apply_to(run);
        true
    }

    /// Stores a freshly fetched full detail record. The fetched record
    /// is authoritative for every server-side field; the client-local
    /// detail flags are set to "loaded".
    pub fn apply_run_details(&mut self, mut run: TestRun) {
        if run.id.is_empty() {
            return;
        }
        run.details_loading = false;
        run.details_available = true;
        self.runs.insert(run.id.clone(), run);
    }

    /// Marks a detail fetch as started. Returns false when one is
    /// already in flight for this run, so callers never issue duplicate
    /// fetches.
    pub fn begin_details_load(&mut self, id: &str) -> bool {
        // Unknown runs may still be fetched; the response inserts them.
        let Some(run) = self.runs.get_mut(id) else {
            return true;
        };
        if run.details_loading {
            return false;
        }
        run.details_loading = true;
        true
    }

    pub fn finish_details_load(&mut self, id: &str) {
        if let Some(run) = self.runs.get_mut(id) {
            run.details_loading = false;
        }
    }

    pub fn append_executed_command(&mut self, id: &str, command: ExecutedCommand) {
        let Some(run) = self.runs.get_mut(id) else {
            debug!("Dropping executed command for unknown run {}", id);
            return;
        };
        run.executed_commands.push(command);
    }

    /// Concatenates a log chunk in arrival order, creating the entry if
    /// absent. Duplicate delivery double-appends; see DESIGN.md.
    pub fn append_log(&mut self, id: &str, chunk: &str) {
        self.logs.entry(id.to_owned()).or_default().push_str(chunk);
    }

    /// Starts a fresh accumulation for `id`. The controller resends the
    /// log tail on subscribe, so any stale buffer is discarded first.
    pub fn subscribe_log(&mut self, id: &str) {
        self.logs.remove(id);
        self.subscribed_log = Some(id.to_owned());
    }

    pub fn unsubscribe_log(&mut self) {
        if let Some(id) = self.subscribed_log.take() {
            self.logs.remove(&id);
        }
    }

    #[must_use]
    pub fn subscribed_log(&self) -> Option<&str> {
        self.subscribed_log.as_deref()
    }

    #[must_use]
    pub fn log(&self, id: &str) -> Option<&str> {
        self.logs.get(id).map(String::as_str)
    }

    pub fn set_maintenance_mode(&mut self, on: bool) {
        self.maintenance_mode = on;
    }

    pub fn set_system_state(&mut self, state: &str) {
        self.system_state = state.to_owned();
    }

    pub fn set_controller_config(&mut self, config: ControllerConfig) {
        self.controller_config = config;
    }

    pub fn set_agent_count(&mut self, count: i64) {
        self.agent_count = count;
    }

    pub fn set_online_users(&mut self, count: i64) {
        self.online_users = count;
    }

    pub fn set_connection_phase(&mut self, phase: ConnectionPhase) {
        if matches!(phase, ConnectionPhase::ReconnectPending) {
            self.connection.retries = self.connection.retries.saturating_add(1);
        }
        self.connection.phase = phase;
    }

    pub fn mark_connected(&mut self) {
        self.connection.phase = ConnectionPhase::Connected;
        self.connection.retries = 0;
        self.connection.connection_count = self.connection.connection_count.saturating_add(1);
    }

    pub fn mark_disconnected(&mut self) {
        self.connection.phase = ConnectionPhase::ReconnectPending;
    }

    #[must_use]
    pub fn run(&self, id: &str) -> Option<&TestRun> {
        self.runs.get(id)
    }

    pub fn runs(&self) -> impl Iterator<Item = &TestRun> {
        self.runs.values()
    }

    #[must_use]
    pub fn architectures(&self) -> &[Architecture] {
        &self.architectures
    }

    #[must_use]
    pub fn architecture(&self, id: &str) -> Option<&Architecture> {
        self.architectures.iter().find(|arch| arch.id == id)
    }

    #[must_use]
    pub fn launch_templates(&self) -> &[LaunchTemplate] {
        &self.launch_templates
    }

    #[must_use]
    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    #[must_use]
    pub fn users(&self) -> &[User] {
        &self.users
    }

    #[must_use]
    pub const fn me(&self) -> &User {
        &self.me
    }

    #[must_use]
    pub fn run_fields(&self) -> &[RunFieldSpec] {
        &self.run_fields
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub const fn maintenance_mode(&self) -> bool {
        self.maintenance_mode
    }

    #[must_use]
    pub fn system_state(&self) -> &str {
        &self.system_state
    }

    #[must_use]
    pub const fn controller_config(&self) -> ControllerConfig {
        self.controller_config
    }

    #[must_use]
    pub const fn agent_count(&self) -> i64 {
        self.agent_count
    }

    #[must_use]
    pub const fn online_users(&self) -> i64 {
        self.online_users
    }

    #[must_use]
    pub const fn initial_state_loaded(&self) -> bool {
        self.initial_state_loaded
    }

    #[must_use]
    pub const fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub(super) fn sweeps_raw(&self) -> &[Sweep] {
        &self.sweeps
    }

    pub fn mark_sweep_runs_available(&mut self, sweep_id: &str) {
        if let Some(sweep) = self.sweeps.iter_mut().find(|sweep| sweep.id == sweep_id) {
            sweep.runs_available = true;
        }
    }
}
