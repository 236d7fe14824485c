use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::ControllerApi;
use crate::channel::{BackoffPolicy, ChannelEvent, ClientCommand, run_channel};
use crate::compose::{
    AgentChoice, EstimateSummary, FailureTarget, FieldValue, RunDraft, apply_failure,
    apply_role_composition, apply_role_config, assign_agent, select_sweep_parameter,
};
use crate::error::{AppResult, ChannelError};
use crate::model::{InitialState, TestRun};
use crate::notify::{Notice, Notifier};
use crate::store::{Effect, Store, route};

/// Results of work the service farmed out to background tasks, fed back
/// into the main event queue so every store mutation still happens on
/// the service task.
#[derive(Debug)]
enum InternalEvent {
    InitialStateLoaded(Box<InitialState>),
    InitialStateFailed { message: String },
    RunDetailsLoaded(Box<TestRun>),
    RunDetailsFailed { id: String, message: String },
}

/// Owns the store and the draft, runs the live channel, and processes
/// events one at a time. There is exactly one of these per console; all
/// state mutation funnels through its event loop, so no locking is
/// needed anywhere.
pub struct ConsoleService<TApi> {
    api: Arc<TApi>,
    store: Store,
    draft: RunDraft,
    notifier: Notifier,
    events_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    internal_tx: mpsc::UnboundedSender<InternalEvent>,
    internal_rx: mpsc::UnboundedReceiver<InternalEvent>,
    commands_tx: mpsc::UnboundedSender<ClientCommand>,
    shutdown_tx: watch::Sender<bool>,
    channel_task: JoinHandle<()>,
}

impl<TApi> ConsoleService<TApi>
where
    TApi: ControllerApi + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(
        api: Arc<TApi>,
        backoff: Arc<dyn BackoffPolicy>,
    ) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (notifier, notices_rx) = Notifier::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let channel_api = Arc::clone(&api);
        let channel_task = tokio::spawn(async move {
            run_channel(
                channel_api.as_ref(),
                &events_tx,
                commands_rx,
                backoff.as_ref(),
                shutdown_rx,
            )
            .await;
        });
        (
            Self {
                api,
                store: Store::new(),
                draft: RunDraft::default(),
                notifier,
                events_rx,
                internal_tx,
                internal_rx,
                commands_tx,
                shutdown_tx,
                channel_task,
            },
            notices_rx,
        )
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub const fn draft(&self) -> &RunDraft {
        &self.draft
    }

    /// Processes events until the live channel goes away. Cancel the
    /// returned future (and call [`Self::shutdown`]) to stop earlier.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel task disappears without a
    /// shutdown request.
    pub async fn run(&mut self) -> AppResult<()> {
        loop {
            self.tick().await?;
        }
    }

    /// Waits for and processes exactly one event.
    ///
    /// # Errors
    ///
    /// Returns an error when the event channel closes unexpectedly.
    pub async fn tick(&mut self) -> AppResult<()> {
        tokio::select! {
            event = self.events_rx.recv() => {
                let Some(event) = event else {
                    return Err(ChannelError::EventChannelClosed.into());
                };
                self.handle_channel_event(event);
                Ok(())
            }
            internal = self.internal_rx.recv() => {
                if let Some(internal) = internal {
                    self.handle_internal_event(internal);
                }
                Ok(())
            }
        }
    }

    pub fn shutdown(&self) {
        drop(self.shutdown_tx.send(true));
        self.channel_task.abort();
    }

    fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::PhaseChanged(phase) => {
                self.store.set_connection_phase(phase);
            }
            ChannelEvent::Connected => {
                self.store.mark_connected();
                self.notifier.success("Connected to live channel");
                // A fresh connection has no server-side subscription
                // state; re-issue the log subscription for the run the
                // operator is still watching.
                if let Some(id) = self.store.subscribed_log() {
                    self.send_command(ClientCommand::SubscribeRunLog { id: id.to_owned() });
                }
            }
            ChannelEvent::Disconnected { reason } => {
                self.store.mark_disconnected();
                self.notifier
                    .error(format!("Disconnected from live channel, reconnecting: {reason}"));
            }
            ChannelEvent::Event(event) => {
                let effects = route(&mut self.store, event);
                for effect in effects {
                    self.execute_effect(effect);
                }
            }
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Notice(notice) => self.notifier.notify(notice),
            Effect::FetchRunDetails { id } => self.request_run_details(&id),
            Effect::LoadInitialState => self.request_initial_state(),
        }
    }

    fn handle_internal_event(&mut self, event: InternalEvent) {
        match event {
            InternalEvent::InitialStateLoaded(state) => {
                self.store.apply_initial_state(*state);
                // The draft always starts from the first architecture's
                // declared default composition.
                if let Some(arch) = self.store.architectures().first() {
                    self.draft = RunDraft::from_run(&arch.default_test);
                }
            }
            InternalEvent::InitialStateFailed { message } => {
                self.notifier.error(message);
            }
            InternalEvent::RunDetailsLoaded(run) => {
                self.store.apply_run_details(*run);
            }
            InternalEvent::RunDetailsFailed { id, message } => {
                self.store.finish_details_load(&id);
                self.notifier.error(message);
            }
        }
    }

    /// Fetches the full detail record for a run in the background; the
    /// result re-enters the event queue. Duplicate requests are gated
    /// by the store's details-loading flag.
    pub fn request_run_details(&mut self, id: &str) {
        if !self.store.begin_details_load(id) {
            debug!("Details for run {} already loading", id);
            return;
        }
        let api = Arc::clone(&self.api);
        let tx = self.internal_tx.clone();
        let id = id.to_owned();
        tokio::spawn(async move {
            let event = match api.run_details(&id).await {
                Ok(run) => InternalEvent::RunDetailsLoaded(Box::new(run)),
                Err(err) => InternalEvent::RunDetailsFailed {
                    id,
                    message: err.to_string(),
                },
            };
            drop(tx.send(event));
        });
    }

    fn request_initial_state(&self) {
        let api = Arc::clone(&self.api);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let event = match api.initial_state().await {
                Ok(state) => InternalEvent::InitialStateLoaded(Box::new(state)),
                Err(err) => InternalEvent::InitialStateFailed {
                    message: err.to_string(),
                },
            };
            drop(tx.send(event));
        });
    }

    pub fn subscribe_run_log(&mut self, id: &str) {
        self.store.subscribe_log(id);
        self.send_command(ClientCommand::SubscribeRunLog { id: id.to_owned() });
    }

    pub fn unsubscribe_run_log(&mut self) {
        self.store.unsubscribe_log();
        self.send_command(ClientCommand::UnsubscribeRunLog {});
    }

    fn send_command(&self, command: ClientCommand) {
        if self.commands_tx.send(command).is_err() {
            warn!("Live channel command queue is gone");
        }
    }

    /// Assigns one draft field; an architecture change resets the whole
    /// draft to the new architecture's default. Validation faults are
    /// surfaced as notices and leave the draft unchanged.
    pub fn set_draft_field(&mut self, field: &str, value: &FieldValue) {
        let result = self
            .draft
            .set_scalar(field, value, self.store.architectures());
        if let Err(err) = result {
            self.notifier.error(err.to_string());
        }
    }

    pub fn apply_draft_role_config(&mut self, role: &str, count: &str, choices: &[AgentChoice]) {
        if let Err(err) = apply_role_config(&mut self.draft.roles, role, count, choices) {
            self.notifier.error(err.to_string());
        }
    }

    pub fn apply_draft_sweep_role_config(
        &mut self,
        role: &str,
        count: &str,
        choices: &[AgentChoice],
    ) {
        if let Err(err) = apply_role_config(&mut self.draft.sweep_roles, role, count, choices) {
            self.notifier.error(err.to_string());
        }
    }

    pub fn add_draft_role(&mut self, role: &str) {
        crate::compose::add_role(&mut self.draft.roles, role);
    }

    pub fn delete_draft_role(&mut self, role: &str) {
        crate::compose::delete_role(&mut self.draft.roles, role);
    }

    pub fn add_draft_sweep_role(&mut self, role: &str) {
        crate::compose::add_role(&mut self.draft.sweep_roles, role);
    }

    pub fn delete_draft_sweep_role(&mut self, role: &str) {
        crate::compose::delete_role(&mut self.draft.sweep_roles, role);
    }

    pub fn assign_draft_agent(&mut self, role: &str, index: usize, choice: &str) {
        let choice = match AgentChoice::parse(choice, self.store.launch_templates()) {
            Ok(choice) => choice,
            Err(err) => {
                self.notifier.error(err.to_string());
                return;
            }
        };
        if let Err(err) = assign_agent(&mut self.draft.roles, role, index, &choice) {
            self.notifier.error(err.to_string());
        }
    }

    pub fn assign_draft_sweep_agent(&mut self, role: &str, index: usize, choice: &str) {
        let choice = match AgentChoice::parse(choice, self.store.launch_templates()) {
            Ok(choice) => choice,
            Err(err) => {
                self.notifier.error(err.to_string());
                return;
            }
        };
        if let Err(err) = assign_agent(&mut self.draft.sweep_roles, role, index, &choice) {
            self.notifier.error(err.to_string());
        }
    }

    pub fn apply_draft_role_composition(&mut self, roles: &[String]) {
        apply_role_composition(&mut self.draft.roles, roles);
    }

    /// Applies or clears failure injection on every assignment the
    /// selector matches. `delay == None` means "do not fail".
    pub fn apply_draft_failure(&mut self, target: &str, delay: Option<&str>) {
        let target = match FailureTarget::parse(target) {
            Ok(target) => target,
            Err(err) => {
                self.notifier.error(err.to_string());
                return;
            }
        };
        if let Err(err) = apply_failure(&mut self.draft.roles, &target, delay) {
            self.notifier.error(err.to_string());
        }
    }

    pub fn select_draft_sweep_parameter(&mut self, field: &str) {
        if let Err(err) = select_sweep_parameter(&mut self.draft, field) {
            self.notifier.error(err.to_string());
        }
    }

    /// Estimate round-trip for the confirmation dialog.
    pub async fn estimate_draft(&self) -> Option<EstimateSummary> {
        match crate::compose::estimate(self.api.as_ref(), &self.draft).await {
            Ok(summary) => Some(summary),
            Err(err) => {
                self.notifier.error(err.to_string());
                None
            }
        }
    }

    /// Validates and submits the draft. Returns true when the run was
    /// scheduled; the caller is expected to navigate to the running
    /// view. On any failure the draft is untouched and an error notice
    /// is raised.
    pub async fn submit_draft(&self) -> bool {
        match crate::compose::validate_and_submit(self.api.as_ref(), &self.draft).await {
            Ok(()) => {
                self.notifier.success("Test run scheduled successfully");
                true
            }
            Err(err) => {
                self.notifier.error(err.to_string());
                false
            }
        }
    }

    /// Loads a finished run's details and reseeds the draft from them,
    /// so the operator can schedule a variation of it.
    pub async fn reschedule_run(&mut self, id: &str) {
        match self.api.run_details(id).await {
            Ok(run) => {
                self.draft = RunDraft::from_run(&run);
                self.store.apply_run_details(run);
            }
            Err(err) => {
                self.notifier.error(err.to_string());
            }
        }
    }

    /// Builds a service without a live channel driver; tests inject
    /// channel events and observe outbound commands directly.
    #[cfg(test)]
    fn new_for_tests(
        api: Arc<TApi>,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<Notice>,
        mpsc::UnboundedSender<ChannelEvent>,
        mpsc::UnboundedReceiver<ClientCommand>,
    ) {
        let (notifier, notices_rx) = Notifier::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        let channel_task = tokio::spawn(async {});
        (
            Self {
                api,
                store: Store::new(),
                draft: RunDraft::default(),
                notifier,
                events_rx,
                internal_tx,
                internal_rx,
                commands_tx,
                shutdown_tx,
                channel_task,
            },
            notices_rx,
            events_tx,
            commands_rx,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::api::{ControllerApi, Estimate, OkResponse, TrimParameters, WsToken};
    use crate::channel::{ChannelEvent, ClientCommand, RunStatusPayload, ServerEvent, SystemStatePayload};
    use crate::error::{AppError, AppResult};
    use crate::model::{
        Architecture, ExecutedCommand, InitialState, RunRole, RunStatus, TestRun, zero_time,
    };
    use crate::notify::{Notice, NoticeKind};

    use super::ConsoleService;

    struct FakeApi;

    fn details_fixture() -> TestRun {
        TestRun {
            id: "tr-1".to_owned(),
            status: RunStatus::Completed,
            executed_commands: vec![ExecutedCommand {
                command: "loadgen".to_owned(),
                ..ExecutedCommand::default()
            }],
            ..TestRun::default()
        }
    }

    fn initial_state_fixture() -> InitialState {
        let architecture = Architecture {
            id: "default".to_owned(),
            name: "Default".to_owned(),
            default_test: TestRun {
                architecture_id: "default".to_owned(),
                roles: vec![RunRole::unassigned("shard", 0)],
                ..TestRun::default()
            },
            ..Architecture::default()
        };
        InitialState {
            architectures: vec![architecture],
            ..InitialState::default()
        }
    }

    #[async_trait]
    impl ControllerApi for FakeApi {
        async fn ws_token(&self) -> AppResult<WsToken> {
            Err(AppError::api("ws_token is not used in this test"))
        }

        async fn initial_state(&self) -> AppResult<InitialState> {
            Ok(initial_state_fixture())
        }

        async fn run_details(&self, id: &str) -> AppResult<TestRun> {
            let mut run = details_fixture();
            run.id = id.to_owned();
            Ok(run)
        }

        async fn schedule_run(&self, _run: &TestRun) -> AppResult<OkResponse> {
            Ok(OkResponse { ok: true })
        }

        async fn estimate_run(&self, _run: &TestRun) -> AppResult<Estimate> {
            Ok(Estimate::default())
        }

        async fn terminate_run(&self, _id: &str) -> AppResult<OkResponse> {
            Err(AppError::api("terminate_run is not used in this test"))
        }

        async fn retry_spawn(&self, _id: &str) -> AppResult<OkResponse> {
            Err(AppError::api("retry_spawn is not used in this test"))
        }

        async fn redownload_outputs(&self, _id: &str) -> AppResult<OkResponse> {
            Err(AppError::api("redownload_outputs is not used in this test"))
        }

        async fn recalculate_results(
            &self,
            _id: &str,
            _trim: &TrimParameters,
        ) -> AppResult<OkResponse> {
            Err(AppError::api("recalculate_results is not used in this test"))
        }

        async fn cancel_sweep(&self, _id: &str) -> AppResult<OkResponse> {
            Err(AppError::api("cancel_sweep is not used in this test"))
        }

        async fn continue_sweep(&self, _id: &str) -> AppResult<OkResponse> {
            Err(AppError::api("continue_sweep is not used in this test"))
        }

        async fn schedule_missing_sweep_runs(&self, _id: &str) -> AppResult<OkResponse> {
            Err(AppError::api("schedule_missing_sweep_runs is not used in this test"))
        }

        async fn set_max_agents(&self, _max: i64) -> AppResult<()> {
            Err(AppError::api("set_max_agents is not used in this test"))
        }

        async fn toggle_maintenance(&self) -> AppResult<()> {
            Err(AppError::api("toggle_maintenance is not used in this test"))
        }
    }

    fn status_event(id: &str, status: RunStatus) -> ChannelEvent {
        ChannelEvent::Event(ServerEvent::RunStatusChanged(RunStatusPayload {
            test_run_id: id.to_owned(),
            status,
            started: zero_time(),
            completed: zero_time(),
            details: String::new(),
        }))
    }

    fn drain_notices(notices_rx: &mut mpsc::UnboundedReceiver<Notice>) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = notices_rx.try_recv() {
            notices.push(notice);
        }
        notices
    }

    fn expect_subscribe_command(
        commands_rx: &mut mpsc::UnboundedReceiver<ClientCommand>,
        expected_id: &str,
    ) -> AppResult<()> {
        let command = commands_rx
            .try_recv()
            .map_err(|err| AppError::channel(err.to_string()))?;
        match command {
            ClientCommand::SubscribeRunLog { id } => {
                if id == expected_id {
                    Ok(())
                } else {
                    Err(AppError::channel(format!("Unexpected subscription id {id}")))
                }
            }
            ClientCommand::UnsubscribeRunLog {} => {
                Err(AppError::channel("Unexpected unsubscribe command"))
            }
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn system_running_loads_initial_state_and_seeds_the_draft() -> AppResult<()> {
        let (mut service, _notices_rx, events_tx, _commands_rx) =
            ConsoleService::new_for_tests(Arc::new(FakeApi));

        let sent = events_tx.send(ChannelEvent::Event(ServerEvent::SystemStateChanged(
            SystemStatePayload {
                state: "running".to_owned(),
            },
        )));
        if sent.is_err() {
            return Err(AppError::channel("Expected the event to enqueue"));
        }
        service.tick().await?;
        service.tick().await?;

        if !service.store().initial_state_loaded() {
            return Err(AppError::channel("Expected the initial state to load"));
        }
        if service.draft().architecture_id != "default" {
            return Err(AppError::channel(
                "Expected the draft seeded from the first architecture",
            ));
        }
        if service.draft().roles.len() != 1 {
            return Err(AppError::channel("Expected the default composition"));
        }
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn completed_run_gets_its_details_fetched() -> AppResult<()> {
        let (mut service, mut notices_rx, events_tx, _commands_rx) =
            ConsoleService::new_for_tests(Arc::new(FakeApi));
        service.store.upsert_run(TestRun {
            id: "tr-1".to_owned(),
            status: RunStatus::Running,
            ..TestRun::default()
        });

        let sent = events_tx.send(status_event("tr-1", RunStatus::Completed));
        if sent.is_err() {
            return Err(AppError::channel("Expected the event to enqueue"));
        }
        service.tick().await?;
        service.tick().await?;

        let run = service
            .store()
            .run("tr-1")
            .ok_or_else(|| AppError::channel("Expected the run to exist"))?;
        if !run.details_available || run.executed_commands.is_empty() {
            return Err(AppError::channel(
                "Expected the detail fetch to land the full record",
            ));
        }
        let notices = drain_notices(&mut notices_rx);
        if !notices.iter().any(|n| n.kind == NoticeKind::Success) {
            return Err(AppError::channel("Expected a completion notice"));
        }
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn reconnect_reissues_the_log_subscription() -> AppResult<()> {
        let (mut service, mut notices_rx, _events_tx, mut commands_rx) =
            ConsoleService::new_for_tests(Arc::new(FakeApi));

        service.subscribe_run_log("tr-7");
        expect_subscribe_command(&mut commands_rx, "tr-7")?;

        service.handle_channel_event(ChannelEvent::Connected);
        expect_subscribe_command(&mut commands_rx, "tr-7")?;
        if service.store().connection().connection_count != 1 {
            return Err(AppError::channel("Expected one counted connection"));
        }
        let connect_notices = drain_notices(&mut notices_rx);
        if !connect_notices.iter().any(|n| n.kind == NoticeKind::Success) {
            return Err(AppError::channel("Expected a connected notice"));
        }

        service.handle_channel_event(ChannelEvent::Disconnected {
            reason: "server restart".to_owned(),
        });
        let disconnect_notices = drain_notices(&mut notices_rx);
        if !disconnect_notices.iter().any(|n| n.kind == NoticeKind::Error) {
            return Err(AppError::channel("Expected a disconnected notice"));
        }
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn validation_faults_surface_as_error_notices() -> AppResult<()> {
        let (mut service, mut notices_rx, _events_tx, _commands_rx) =
            ConsoleService::new_for_tests(Arc::new(FakeApi));

        service.apply_draft_failure("role:shard|0", Some("not-a-number"));
        let notices = drain_notices(&mut notices_rx);
        let first = notices
            .first()
            .ok_or_else(|| AppError::channel("Expected a validation notice"))?;
        if first.kind != NoticeKind::Error {
            return Err(AppError::channel(format!("Unexpected notice: {first:?}")));
        }
        if service.draft().roles.iter().any(|r| r.failure.is_some()) {
            return Err(AppError::channel("Expected no draft mutation"));
        }
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn submitting_a_valid_draft_raises_a_success_notice() -> AppResult<()> {
        let (mut service, mut notices_rx, _events_tx, _commands_rx) =
            ConsoleService::new_for_tests(Arc::new(FakeApi));
        service.draft.commit_hash = "abc123".to_owned();
        service.draft.roles.push(RunRole::unassigned("shard", 0));

        if !service.submit_draft().await {
            return Err(AppError::channel("Expected the submission to succeed"));
        }
        let notices = drain_notices(&mut notices_rx);
        if !notices.iter().any(|n| n.kind == NoticeKind::Success) {
            return Err(AppError::channel("Expected a scheduled notice"));
        }
        Ok(())
    }
}
