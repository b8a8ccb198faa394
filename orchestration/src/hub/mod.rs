//! Realtime hub — authenticated socket connections, session rooms, and
//! state fan-out.
//!
//! Every connection is authenticated from a transport token before any
//! session logic runs. A connection task multiplexes three inputs:
//! inbound client frames, the orchestrator's event stream (filtered to
//! the rooms this connection joined), and a heartbeat ticker. The hub
//! never assumes continuity across connections — a rejoin after
//! reconnect is handled exactly like a first join and answered with a
//! full snapshot.

pub mod protocol;
pub mod room;

use std::collections::HashSet;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::error::OrchestratorError;
use crate::events::SessionEvent;
use protocol::{ClientMessage, ServerMessage};
use room::ConnId;

/// Query parameters of a connection attempt.
#[derive(Debug, Deserialize)]
pub struct WsAuth {
    pub token: Option<String>,
}

type WsSink = SplitSink<WebSocket, Message>;

/// Upgrade handler. The transport token is verified before the upgrade;
/// a missing or rejected token refuses the connection outright.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(auth): Query<WsAuth>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = match auth.token {
        Some(token) => token,
        None => return (StatusCode::UNAUTHORIZED, "missing transport token").into_response(),
    };
    let user_id = match state.tokens.verify_transport_token(&token) {
        Ok(user_id) => user_id,
        Err(e) => {
            debug!("Transport token rejected: {}", e);
            return (StatusCode::UNAUTHORIZED, "invalid transport token").into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: String, state: AppState) {
    let conn_id = state.rooms.register();
    info!(conn_id, user_id = %user_id, "Realtime connection established");

    let (mut sink, mut stream) = socket.split();
    let mut events = state.orchestrator.subscribe();
    let mut joined: HashSet<String> = HashSet::new();
    let mut ticker = tokio::time::interval(state.heartbeat_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if dispatch_frame(&state, &mut sink, &mut joined, conn_id, &user_id, text.as_str())
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary/ping/pong: protocol-level, nothing to do
                    Some(Err(e)) => {
                        debug!(conn_id, "Socket read error: {}", e);
                        break;
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if joined.contains(event.session_id())
                            && forward_event(&mut sink, event).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Fell behind the bus; push fresh snapshots so the
                        // client self-corrects instead of replaying history.
                        warn!(conn_id, skipped, "Event stream lagged; resyncing");
                        if resync(&state, &mut sink, &joined).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ticker.tick() => {
                if send(&mut sink, &ServerMessage::Heartbeat).await.is_err() {
                    break;
                }
            }
        }
    }

    state.rooms.leave_all(conn_id);
    info!(conn_id, user_id = %user_id, "Realtime connection closed");
}

/// Handle one inbound frame. `Err` means the socket is unwritable and
/// the connection task should end.
async fn dispatch_frame(
    state: &AppState,
    sink: &mut WsSink,
    joined: &mut HashSet<String>,
    conn_id: ConnId,
    user_id: &str,
    raw: &str,
) -> Result<(), ()> {
    let message = match serde_json::from_str::<ClientMessage>(raw) {
        Ok(message) => message,
        Err(e) => {
            debug!(conn_id, "Unparseable client frame: {}", e);
            return send(
                sink,
                &ServerMessage::Error {
                    code: "BAD_MESSAGE".to_string(),
                    message: format!("unrecognized message: {}", e),
                },
            )
            .await;
        }
    };

    match message {
        ClientMessage::JoinSession { session_id } => {
            match state.orchestrator.load_session_state(&session_id).await {
                Ok(snapshot) => {
                    let participant = snapshot.session.side_of(user_id).is_some();
                    if !participant && !state.allow_observers {
                        return send_error(
                            sink,
                            "FORBIDDEN",
                            "not a participant in this session".to_string(),
                        )
                        .await;
                    }
                    state.rooms.join(&session_id, conn_id);
                    joined.insert(session_id.clone());
                    info!(
                        conn_id,
                        session_id = %session_id,
                        occupancy = state.rooms.occupancy(&session_id),
                        "Joined session room"
                    );
                    send(sink, &ServerMessage::SessionState { data: snapshot }).await
                }
                Err(e) => send_orchestrator_error(sink, &e).await,
            }
        }
        ClientMessage::RequestState { session_id } => {
            if !joined.contains(&session_id) {
                return send_error(sink, "NOT_JOINED", "join the session first".to_string()).await;
            }
            match state.orchestrator.load_session_state(&session_id).await {
                Ok(snapshot) => send(sink, &ServerMessage::SessionState { data: snapshot }).await,
                Err(e) => send_orchestrator_error(sink, &e).await,
            }
        }
        ClientMessage::SubmitArgument {
            session_id,
            argument,
        } => {
            match state
                .orchestrator
                .submit_argument(&session_id, user_id, argument)
                .await
            {
                // The broadcast path delivers the new state to the room,
                // this connection included.
                Ok(_) => Ok(()),
                Err(e) => send_orchestrator_error(sink, &e).await,
            }
        }
        ClientMessage::ManualJudge { session_id, winner } => {
            if !joined.contains(&session_id) {
                return send_error(sink, "NOT_JOINED", "join the session first".to_string()).await;
            }
            match state.orchestrator.user_judge(&session_id, winner).await {
                Ok(_) => Ok(()),
                Err(e) => send_orchestrator_error(sink, &e).await,
            }
        }
        ClientMessage::Ping => send(sink, &ServerMessage::Heartbeat).await,
    }
}

/// Translate a bus event into its wire message.
async fn forward_event(sink: &mut WsSink, event: SessionEvent) -> Result<(), ()> {
    let message = match event {
        SessionEvent::StateChanged { snapshot, .. } => ServerMessage::SessionState {
            data: *snapshot,
        },
        SessionEvent::TurnReady {
            speaker,
            order_index,
            ..
        } => ServerMessage::YourTurn {
            speaker,
            order_index,
        },
        SessionEvent::Adjudicated {
            winner,
            judge_result,
            ..
        } => ServerMessage::Winner {
            winner,
            judge_result,
        },
    };
    send(sink, &message).await
}

/// Push fresh snapshots for every joined room.
async fn resync(state: &AppState, sink: &mut WsSink, joined: &HashSet<String>) -> Result<(), ()> {
    for session_id in joined {
        if let Ok(snapshot) = state.orchestrator.load_session_state(session_id).await {
            send(sink, &ServerMessage::SessionState { data: snapshot }).await?;
        }
    }
    Ok(())
}

async fn send_orchestrator_error(sink: &mut WsSink, error: &OrchestratorError) -> Result<(), ()> {
    send_error(sink, error.code(), error.to_string()).await
}

async fn send_error(sink: &mut WsSink, code: &str, message: String) -> Result<(), ()> {
    send(
        sink,
        &ServerMessage::Error {
            code: code.to_string(),
            message,
        },
    )
    .await
}

async fn send(sink: &mut WsSink, message: &ServerMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize server message: {}", e);
            return Ok(());
        }
    };
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
