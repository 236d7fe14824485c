use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::api::ControllerApi;

use super::backoff::BackoffPolicy;
use super::protocol::{ClientCommand, ServerEvent};
use super::session::SessionManager;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Connection lifecycle as tracked by the store: the channel is idle,
/// fetching a token, dialing, connected, or waiting out a retry delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Idle,
    AcquiringToken,
    Connecting,
    Connected,
    ReconnectPending,
}

/// Local notifications delivered to the service alongside decoded
/// server events. Ordering matches the wire: events are forwarded in
/// the order frames arrive, with no buffering beyond the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    PhaseChanged(ConnectionPhase),
    Connected,
    Disconnected { reason: String },
    Event(ServerEvent),
}

enum ConnectionEnd {
    Shutdown,
    Lost(String),
}

/// Drives the live channel until shutdown: acquire a token, connect,
/// pump frames, and on any loss wait out the backoff delay and start
/// over with a fresh token. Ends quietly when the event receiver or the
/// command sender goes away (the service shut down).
pub async fn run_channel<TApi>(
    api: &TApi,
    events_tx: &mpsc::UnboundedSender<ChannelEvent>,
    mut commands_rx: mpsc::UnboundedReceiver<ClientCommand>,
    backoff: &dyn BackoffPolicy,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    TApi: ControllerApi + Sync,
{
    let session = SessionManager::new();
    let mut retries: u32 = 0;

    loop {
        if *shutdown_rx.borrow() {
            return;
        }

        if events_tx
            .send(ChannelEvent::PhaseChanged(ConnectionPhase::AcquiringToken))
            .is_err()
        {
            return;
        }
        let token = match session.acquire_token(api).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                // Another acquisition is in flight; back off instead of
                // racing it.
                wait_retry(events_tx, backoff, &mut retries, &mut shutdown_rx).await;
                continue;
            }
            Err(err) => {
                warn!("Token acquisition failed: {}", err);
                wait_retry(events_tx, backoff, &mut retries, &mut shutdown_rx).await;
                continue;
            }
        };

        if events_tx
            .send(ChannelEvent::PhaseChanged(ConnectionPhase::Connecting))
            .is_err()
        {
            return;
        }
        info!("Connecting to live channel {}", token.target);
        let stream = match connect_async(token.target.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(err) => {
                warn!("Live channel connect failed: {}", err);
                wait_retry(events_tx, backoff, &mut retries, &mut shutdown_rx).await;
                continue;
            }
        };

        retries = 0;
        if events_tx.send(ChannelEvent::Connected).is_err() {
            return;
        }

        let (mut sink, mut source) = stream.split();
        let end = pump_connection(
            &mut sink,
            &mut source,
            events_tx,
            &mut commands_rx,
            &mut shutdown_rx,
        )
        .await;
        drop(sink.close().await);

        match end {
            ConnectionEnd::Shutdown => return,
            ConnectionEnd::Lost(reason) => {
                if events_tx
                    .send(ChannelEvent::Disconnected { reason })
                    .is_err()
                {
                    return;
                }
                wait_retry(events_tx, backoff, &mut retries, &mut shutdown_rx).await;
            }
        }
    }
}

async fn pump_connection(
    sink: &mut WsSink,
    source: &mut WsSource,
    events_tx: &mpsc::UnboundedSender<ChannelEvent>,
    commands_rx: &mut mpsc::UnboundedReceiver<ClientCommand>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> ConnectionEnd {
    loop {
        tokio::select! {
            frame = source.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        forward_frame(&text, events_tx);
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        return ConnectionEnd::Lost("server closed the channel".to_owned());
                    }
                    Some(Err(err)) => {
                        return ConnectionEnd::Lost(err.to_string());
                    }
                    None => {
                        return ConnectionEnd::Lost("stream ended".to_owned());
                    }
                }
            }
            command = commands_rx.recv() => {
                let Some(command) = command else {
                    return ConnectionEnd::Shutdown;
                };
                let payload = match command.encode() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!("Dropping unencodable command: {}", err);
                        continue;
                    }
                };
                if let Err(err) = sink.send(Message::Text(payload)).await {
                    return ConnectionEnd::Lost(err.to_string());
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    return ConnectionEnd::Shutdown;
                }
            }
        }
    }
}

/// Frames are delivered downstream in arrival order. A frame that fails
/// to decode is logged and skipped; it never tears down the connection.
fn forward_frame(text: &str, events_tx: &mpsc::UnboundedSender<ChannelEvent>) {
    match ServerEvent::decode(text) {
        Ok(Some(event)) => {
            drop(events_tx.send(ChannelEvent::Event(event)));
        }
        Ok(None) => {
            debug!("Ignoring unrecognized event type");
        }
        Err(err) => {
            warn!("Failed to decode event: {}", err);
        }
    }
}

async fn wait_retry(
    events_tx: &mpsc::UnboundedSender<ChannelEvent>,
    backoff: &dyn BackoffPolicy,
    retries: &mut u32,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    drop(events_tx.send(ChannelEvent::PhaseChanged(ConnectionPhase::ReconnectPending)));
    let delay = backoff.delay(*retries);
    *retries = retries.saturating_add(1);
    sleep_or_shutdown(delay, shutdown_rx).await;
}

async fn sleep_or_shutdown(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) {
    tokio::select! {
        () = tokio::time::sleep(delay) => {}
        changed = shutdown_rx.changed() => {
            drop(changed);
        }
    }
}
