//! Realtime client connection lifecycle.
//!
//! One background task owns the socket. The handle feeds it commands
//! over a channel; server pushes come back as [`ClientEvent`]s. On any
//! connection loss the task reconnects with capped exponential backoff —
//! unless disconnect was explicitly requested — and a fresh join after
//! reconnect yields a full snapshot, so no continuity is assumed.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use orchestration::session::{JudgeRecord, SessionSnapshot, Speaker, Winner};
use orchestration::{ClientMessage, ServerMessage};

use crate::reconnect::{ReconnectDecision, ReconnectPolicy, ReconnectState};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client-side configuration for one connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Realtime endpoint, e.g. `ws://127.0.0.1:8080/ws`.
    pub server_url: String,
    /// Transport token appended to the connection URL.
    pub transport_token: String,
    pub reconnect: ReconnectPolicy,
    /// Bound on a single connection attempt.
    pub connect_timeout: Duration,
    /// Absence of any inbound traffic (heartbeats included) for this
    /// long triggers reconnection.
    pub idle_timeout: Duration,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>, transport_token: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            transport_token: transport_token.into(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(45),
        }
    }
}

/// Events surfaced to the consumer.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A connection (initial or re-established) is live.
    Connected,
    /// A full session snapshot arrived.
    StateUpdated(Box<SessionSnapshot>),
    /// A turn position opened up.
    TurnReady { speaker: Speaker, order_index: u32 },
    /// The session settled.
    Adjudicated {
        winner: Winner,
        judge_result: JudgeRecord,
    },
    /// A typed error pushed by the server.
    ServerError { code: String, message: String },
    /// The reconnect budget is exhausted; realtime sync has failed and
    /// the user must be notified.
    SyncFailed { attempts: u32 },
    /// The client disconnected on request.
    Disconnected,
}

/// Error from handle operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("client connection task has ended")]
    ConnectionClosed,
}

enum Command {
    Send(ClientMessage),
    Disconnect,
}

/// Handle to a running client connection. Cheap to clone.
#[derive(Clone)]
pub struct ArenaClient {
    commands: mpsc::UnboundedSender<Command>,
}

impl ArenaClient {
    /// Spawn the connection task and return the handle plus the event
    /// stream.
    pub fn connect(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_loop(config, command_rx, event_tx));
        (
            Self {
                commands: command_tx,
            },
            event_rx,
        )
    }

    pub fn join_session(&self, session_id: impl Into<String>) -> Result<(), ClientError> {
        self.send(ClientMessage::JoinSession {
            session_id: session_id.into(),
        })
    }

    /// Explicit resynchronization; push remains the canonical channel.
    pub fn request_state(&self, session_id: impl Into<String>) -> Result<(), ClientError> {
        self.send(ClientMessage::RequestState {
            session_id: session_id.into(),
        })
    }

    pub fn submit_argument(
        &self,
        session_id: impl Into<String>,
        argument: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.send(ClientMessage::SubmitArgument {
            session_id: session_id.into(),
            argument: argument.into(),
        })
    }

    pub fn manual_judge(
        &self,
        session_id: impl Into<String>,
        winner: Winner,
    ) -> Result<(), ClientError> {
        self.send(ClientMessage::ManualJudge {
            session_id: session_id.into(),
            winner,
        })
    }

    pub fn ping(&self) -> Result<(), ClientError> {
        self.send(ClientMessage::Ping)
    }

    /// Intentional disconnect: closes the socket and suppresses every
    /// reconnection attempt the close path would otherwise schedule.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.commands
            .send(Command::Disconnect)
            .map_err(|_| ClientError::ConnectionClosed)
    }

    fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        self.commands
            .send(Command::Send(message))
            .map_err(|_| ClientError::ConnectionClosed)
    }
}

/// Map a server push to a consumer event. `None` means pure liveness
/// traffic with nothing to surface.
fn translate(message: ServerMessage) -> Option<ClientEvent> {
    match message {
        ServerMessage::SessionState { data } => Some(ClientEvent::StateUpdated(Box::new(data))),
        ServerMessage::YourTurn {
            speaker,
            order_index,
        } => Some(ClientEvent::TurnReady {
            speaker,
            order_index,
        }),
        ServerMessage::Winner {
            winner,
            judge_result,
        } => Some(ClientEvent::Adjudicated {
            winner,
            judge_result,
        }),
        ServerMessage::Error { code, message } => {
            Some(ClientEvent::ServerError { code, message })
        }
        ServerMessage::Heartbeat => None,
    }
}

async fn run_loop(
    config: ClientConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ClientEvent>,
) {
    let mut reconnect = ReconnectState::new(config.reconnect.clone());
    let url = format!("{}?token={}", config.server_url, config.transport_token);

    loop {
        if reconnect.disconnect_requested() {
            let _ = events.send(ClientEvent::Disconnected);
            return;
        }

        match tokio::time::timeout(config.connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((socket, _response))) => {
                reconnect.connected();
                let _ = events.send(ClientEvent::Connected);
                let manual = drive_connection(
                    socket,
                    &mut commands,
                    &events,
                    &mut reconnect,
                    config.idle_timeout,
                )
                .await;
                if manual {
                    let _ = events.send(ClientEvent::Disconnected);
                    return;
                }
            }
            Ok(Err(e)) => debug!("Connection attempt failed: {}", e),
            Err(_) => debug!("Connection attempt timed out"),
        }

        match reconnect.next_decision() {
            ReconnectDecision::RetryAfter(delay) => {
                debug!(attempt = reconnect.attempts(), delay_ms = delay.as_millis() as u64, "Reconnecting");
                tokio::time::sleep(delay).await;
            }
            ReconnectDecision::GiveUp { attempts } => {
                let _ = events.send(ClientEvent::SyncFailed { attempts });
                return;
            }
            ReconnectDecision::Stopped => {
                let _ = events.send(ClientEvent::Disconnected);
                return;
            }
        }
    }
}

/// Drive one live connection until it drops. Returns whether the end was
/// an explicit disconnect.
async fn drive_connection(
    mut socket: WsStream,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<ClientEvent>,
    reconnect: &mut ReconnectState,
    idle_timeout: Duration,
) -> bool {
    let mut last_traffic = tokio::time::Instant::now();

    loop {
        tokio::select! {
            frame = socket.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        last_traffic = tokio::time::Instant::now();
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(message) => {
                                if let Some(event) = translate(message) {
                                    if events.send(event).is_err() {
                                        // Consumer gone: treat as manual.
                                        reconnect.request_disconnect();
                                        let _ = socket.close(None).await;
                                        return true;
                                    }
                                }
                            }
                            Err(e) => debug!("Unparseable server frame: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return false,
                    Some(Ok(_)) => {
                        last_traffic = tokio::time::Instant::now();
                    }
                    Some(Err(e)) => {
                        debug!("Socket read error: {}", e);
                        return false;
                    }
                }
            }
            command = commands.recv() => {
                match command {
                    Some(Command::Send(message)) => {
                        let json = match serde_json::to_string(&message) {
                            Ok(json) => json,
                            Err(e) => {
                                debug!("Failed to serialize client message: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json)).await.is_err() {
                            return false;
                        }
                    }
                    Some(Command::Disconnect) | None => {
                        reconnect.request_disconnect();
                        let _ = socket.close(None).await;
                        return true;
                    }
                }
            }
            _ = tokio::time::sleep_until(last_traffic + idle_timeout) => {
                debug!("No traffic within the watchdog interval; reconnecting");
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestration::session::{SessionRecord, SessionStatus};

    #[test]
    fn test_translate_session_state() {
        let session = SessionRecord::new(
            "Should AI be regulated?".to_string(),
            2,
            Some("user-a".to_string()),
            Some("user-b".to_string()),
            true,
        );
        let snapshot = SessionSnapshot {
            session,
            turns: vec![],
        };
        let event = translate(ServerMessage::SessionState {
            data: snapshot.clone(),
        })
        .unwrap();
        match event {
            ClientEvent::StateUpdated(received) => assert_eq!(*received, snapshot),
            other => panic!("expected state update, got {:?}", other),
        }
    }

    #[test]
    fn test_translate_heartbeat_is_silent() {
        assert!(translate(ServerMessage::Heartbeat).is_none());
    }

    #[test]
    fn test_rehydrated_wire_snapshot_is_identical() {
        // A snapshot pushed over the wire must reproduce turn order,
        // status, and winner exactly after rehydration.
        let session = SessionRecord::new(
            "Should AI be regulated?".to_string(),
            1,
            Some("user-a".to_string()),
            Some("user-b".to_string()),
            true,
        );
        let snapshot = SessionSnapshot {
            session,
            turns: vec![],
        };
        let wire = serde_json::to_string(&ServerMessage::SessionState {
            data: snapshot.clone(),
        })
        .unwrap();

        let parsed: ServerMessage = serde_json::from_str(&wire).unwrap();
        match translate(parsed).unwrap() {
            ClientEvent::StateUpdated(received) => {
                assert_eq!(received.session.status, SessionStatus::Created);
                assert_eq!(*received, snapshot);
            }
            other => panic!("expected state update, got {:?}", other),
        }
    }

    #[test]
    fn test_translate_server_error_preserves_code() {
        let event = translate(ServerMessage::Error {
            code: "WRONG_SPEAKER".to_string(),
            message: "not your turn".to_string(),
        })
        .unwrap();
        match event {
            ClientEvent::ServerError { code, .. } => assert_eq!(code, "WRONG_SPEAKER"),
            other => panic!("expected server error, got {:?}", other),
        }
    }
}
