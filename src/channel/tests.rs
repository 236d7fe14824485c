use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use crate::api::{ControllerApi, Estimate, OkResponse, TrimParameters, WsToken};
use crate::error::{AppError, AppResult};
use crate::model::{InitialState, RunStatus, TestRun};

use super::backoff::FixedDelay;
use super::live::{ChannelEvent, ConnectionPhase, run_channel};
use super::protocol::{ClientCommand, ServerEvent};
use super::session::SessionManager;

const EVENT_WAIT: Duration = Duration::from_secs(5);

#[test]
fn decode_routes_status_change() -> AppResult<()> {
    let frame = r#"{
        "type": "testRunStatusChanged",
        "payload": {
            "testRunID": "tr-1",
            "status": "Completed",
            "completed": "2024-05-01T12:00:00Z",
            "details": "all done"
        }
    }"#;
    let event = ServerEvent::decode(frame)?
        .ok_or_else(|| AppError::channel("Expected a recognized event"))?;
    let ServerEvent::RunStatusChanged(payload) = event else {
        return Err(AppError::channel("Unexpected event type"));
    };
    if payload.test_run_id != "tr-1" || payload.status != RunStatus::Completed {
        return Err(AppError::channel("Unexpected payload fields"));
    }
    Ok(())
}

#[test]
fn decode_ignores_unknown_event_types() -> AppResult<()> {
    let frame = r#"{"type": "somethingNew", "payload": {"answer": 42}}"#;
    if ServerEvent::decode(frame)?.is_some() {
        return Err(AppError::channel("Expected unknown types to be skipped"));
    }
    Ok(())
}

#[test]
fn decode_rejects_malformed_payloads() -> AppResult<()> {
    let frame = r#"{"type": "testRunLogAppended", "payload": {"id": 17}}"#;
    if ServerEvent::decode(frame).is_ok() {
        return Err(AppError::channel(
            "Expected a malformed recognized payload to error",
        ));
    }
    if ServerEvent::decode("not json at all").is_ok() {
        return Err(AppError::channel("Expected a bad envelope to error"));
    }
    Ok(())
}

#[test]
fn decode_handles_log_and_count_payloads() -> AppResult<()> {
    let log_event = ServerEvent::decode(
        r#"{"type": "testRunLogAppended", "payload": {"id": "tr-1", "log": "chunk"}}"#,
    )?
    .ok_or_else(|| AppError::channel("Expected a log event"))?;
    let ServerEvent::RunLogAppended(log_payload) = log_event else {
        return Err(AppError::channel("Unexpected event type for log append"));
    };
    if log_payload.id != "tr-1" || log_payload.log != "chunk" {
        return Err(AppError::channel("Unexpected log payload"));
    }

    let users_event =
        ServerEvent::decode(r#"{"type": "connectedUsersChanged", "payload": {"count": 4}}"#)?
            .ok_or_else(|| AppError::channel("Expected a user-count event"))?;
    let ServerEvent::ConnectedUsersChanged(users_payload) = users_event else {
        return Err(AppError::channel("Unexpected event type for user count"));
    };
    if users_payload.count != 4 {
        return Err(AppError::channel("Unexpected user count"));
    }
    Ok(())
}

#[test]
fn commands_encode_with_the_outbound_envelope() -> AppResult<()> {
    let subscribe = ClientCommand::SubscribeRunLog {
        id: "tr-1".to_owned(),
    }
    .encode()?;
    let value: serde_json::Value = serde_json::from_str(&subscribe)?;
    if value.get("t").and_then(serde_json::Value::as_str) != Some("subscribeTestRunLog") {
        return Err(AppError::channel(format!("Unexpected tag: {subscribe}")));
    }
    if value
        .get("m")
        .and_then(|m| m.get("id"))
        .and_then(serde_json::Value::as_str)
        != Some("tr-1")
    {
        return Err(AppError::channel(format!("Unexpected body: {subscribe}")));
    }

    let unsubscribe = ClientCommand::UnsubscribeRunLog {}.encode()?;
    let unsub_value: serde_json::Value = serde_json::from_str(&unsubscribe)?;
    if unsub_value.get("t").and_then(serde_json::Value::as_str) != Some("unsubscribeTestRunLog") {
        return Err(AppError::channel(format!("Unexpected tag: {unsubscribe}")));
    }
    Ok(())
}

/// Hands out a scripted sequence of token results.
struct ScriptedTokenApi {
    tokens: tokio::sync::Mutex<VecDeque<Result<WsToken, String>>>,
}

impl ScriptedTokenApi {
    fn new(results: Vec<Result<WsToken, String>>) -> Self {
        Self {
            tokens: tokio::sync::Mutex::new(results.into()),
        }
    }
}

#[async_trait]
impl ControllerApi for ScriptedTokenApi {
    async fn ws_token(&self) -> AppResult<WsToken> {
        let next = self.tokens.lock().await.pop_front();
        match next {
            Some(Ok(token)) => Ok(token),
            Some(Err(message)) => Err(AppError::api(message)),
            None => Err(AppError::api("token script exhausted")),
        }
    }

    async fn initial_state(&self) -> AppResult<InitialState> {
        Err(AppError::api("initial_state is not used in this test"))
    }

    async fn run_details(&self, _id: &str) -> AppResult<TestRun> {
        Err(AppError::api("run_details is not used in this test"))
    }

    async fn schedule_run(&self, _run: &TestRun) -> AppResult<OkResponse> {
        Err(AppError::api("schedule_run is not used in this test"))
    }

    async fn estimate_run(&self, _run: &TestRun) -> AppResult<Estimate> {
        Err(AppError::api("estimate_run is not used in this test"))
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

async fn next_event(
    events_rx: &mut mpsc::UnboundedReceiver<ChannelEvent>,
) -> AppResult<ChannelEvent> {
    match timeout(EVENT_WAIT, events_rx.recv()).await {
        Ok(Some(event)) => Ok(event),
        Ok(None) => Err(AppError::channel("Event channel closed early")),
        Err(err) => Err(AppError::channel(format!("Timed out waiting for event: {err}"))),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn token_failure_retries_once_then_connects() -> AppResult<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        let frame = r#"{"type":"connectedUsersChanged","payload":{"count":3}}"#;
        drop(socket.send(Message::Text(frame.to_owned())).await);
        // Hold the connection open until the client shuts down.
        while let Some(Ok(_)) = socket.next().await {}
    });

    let api = Arc::new(ScriptedTokenApi::new(vec![
        Err("controller unreachable".to_owned()),
        Ok(WsToken {
            target: format!("ws://{addr}"),
        }),
    ]));
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (_commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver = tokio::spawn({
        let api = Arc::clone(&api);
        async move {
            let backoff = FixedDelay::new(Duration::from_millis(10));
            run_channel(api.as_ref(), &events_tx, commands_rx, &backoff, shutdown_rx).await;
        }
    });

    let mut connects = 0_u32;
    let mut retry_waits = 0_u32;
    loop {
        match next_event(&mut events_rx).await? {
            ChannelEvent::Connected => {
                connects = connects.saturating_add(1);
            }
            ChannelEvent::PhaseChanged(ConnectionPhase::ReconnectPending) => {
                retry_waits = retry_waits.saturating_add(1);
            }
            ChannelEvent::Event(ServerEvent::ConnectedUsersChanged(payload)) => {
                if payload.count != 3 {
                    return Err(AppError::channel("Unexpected event payload"));
                }
                break;
            }
            ChannelEvent::PhaseChanged(_) | ChannelEvent::Disconnected { .. } => {}
            ChannelEvent::Event(_) => {}
        }
    }

    if connects != 1 {
        return Err(AppError::channel(format!("Expected one connect, saw {connects}")));
    }
    if retry_waits != 1 {
        return Err(AppError::channel(format!(
            "Expected exactly one retry delay, saw {retry_waits}"
        )));
    }

    drop(shutdown_tx.send(true));
    drop(driver.await);
    server.abort();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn outbound_commands_reach_the_server() -> AppResult<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();
    let server = tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        while let Some(Ok(message)) = socket.next().await {
            if let Message::Text(text) = message {
                if seen_tx.send(text).is_err() {
                    break;
                }
            }
        }
    });

    let api = Arc::new(ScriptedTokenApi::new(vec![Ok(WsToken {
        target: format!("ws://{addr}"),
    })]));
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver = tokio::spawn({
        let api = Arc::clone(&api);
        async move {
            let backoff = FixedDelay::new(Duration::from_millis(10));
            run_channel(api.as_ref(), &events_tx, commands_rx, &backoff, shutdown_rx).await;
        }
    });

    loop {
        if matches!(next_event(&mut events_rx).await?, ChannelEvent::Connected) {
            break;
        }
    }
    let sent = commands_tx.send(ClientCommand::SubscribeRunLog {
        id: "tr-9".to_owned(),
    });
    if sent.is_err() {
        return Err(AppError::channel("Expected the command queue to be open"));
    }

    let received = match timeout(EVENT_WAIT, seen_rx.recv()).await {
        Ok(Some(text)) => text,
        Ok(None) | Err(_) => {
            return Err(AppError::channel("Timed out waiting for the command frame"));
        }
    };
    let value: serde_json::Value = serde_json::from_str(&received)?;
    if value.get("t").and_then(serde_json::Value::as_str) != Some("subscribeTestRunLog") {
        return Err(AppError::channel(format!("Unexpected frame: {received}")));
    }

    drop(shutdown_tx.send(true));
    drop(driver.await);
    server.abort();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn session_manager_allows_one_acquisition_at_a_time() -> AppResult<()> {
    let api = ScriptedTokenApi::new(vec![Ok(WsToken {
        target: "ws://127.0.0.1:1".to_owned(),
    })]);
    let session = SessionManager::new();

    if session.is_acquiring() {
        return Err(AppError::channel("Expected an idle session manager"));
    }
    let first = session.acquire_token(&api).await?;
    if first.is_none() {
        return Err(AppError::channel("Expected the first acquisition to run"));
    }
    if session.is_acquiring() {
        return Err(AppError::channel(
            "Expected the in-flight flag to clear after completion",
        ));
    }

    // A failed acquisition must clear the flag too, or reconnects stall.
    if session.acquire_token(&api).await.is_ok() {
        return Err(AppError::channel("Expected the exhausted script to error"));
    }
    if session.is_acquiring() {
        return Err(AppError::channel("Expected the flag to clear after a failure"));
    }
    Ok(())
}
