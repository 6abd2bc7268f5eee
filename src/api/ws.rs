// src/api/ws.rs
// WebSocket gateway: session channels, typing indicators and pushed answers

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::pipeline::ChatTurn;
use crate::state::AppState;

pub const PROCESS_FAILED: &str = "Failed to process message";
pub const MISSING_FIELDS: &str = "Message and sessionId are required";
pub const INVALID_FRAME: &str = "Invalid message format";

/// Frames sent by clients: `{ "event": "...", "data": ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinSession(String),
    SendMessage(SendMessage),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: String,
}

/// Frames pushed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Typing(bool),
    MessageResponse(ChatTurn),
    Error(String),
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerEvent>();

    let mut connection = WsConnection::new(state, outbound);
    let connection_id = connection.id();
    info!(connection_id = %connection_id, "WebSocket client connected");

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, "Failed to encode server event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => connection.handle_text(text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    drop(connection);
    writer.abort();
    info!(connection_id = %connection_id, "WebSocket client disconnected");
}

/// One client connection. Joins take effect in arrival order; each
/// `send-message` runs in its own task so later frames are not held up by
/// generation. Channel traffic is forwarded into `outbound` by one task per
/// joined session.
pub struct WsConnection {
    id: Uuid,
    state: AppState,
    outbound: mpsc::UnboundedSender<ServerEvent>,
    joined: HashMap<String, JoinHandle<()>>,
}

impl WsConnection {
    pub fn new(state: AppState, outbound: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state,
            outbound,
            joined: HashMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn joined_sessions(&self) -> impl Iterator<Item = &str> {
        self.joined.keys().map(String::as_str)
    }

    /// Decode and handle one text frame. Malformed frames earn an `error`.
    pub async fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => {
                warn!(connection_id = %self.id, error = %e, "Unreadable WebSocket frame");
                send_event(&self.outbound, self.id, ServerEvent::Error(INVALID_FRAME.to_string()));
            }
        }
    }

    pub async fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::JoinSession(session_id) => self.join(session_id),
            ClientEvent::SendMessage(payload) => self.send_message(payload),
        }
    }

    fn join(&mut self, session_id: String) {
        if self.joined.contains_key(&session_id) {
            return;
        }

        let mut membership = self.state.hub.join(&session_id);
        let outbound = self.outbound.clone();
        let connection_id = self.id;

        let forwarder = tokio::spawn(async move {
            loop {
                match membership.recv().await {
                    Ok(message) => {
                        if message.is_for(connection_id) && outbound.send(message.event).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(connection_id = %connection_id, skipped, "WebSocket client lagging, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        info!(connection_id = %self.id, session_id = %session_id, "Client joined session");
        self.joined.insert(session_id, forwarder);
    }

    fn send_message(&self, payload: SendMessage) {
        let SendMessage { message, session_id } = payload;
        if message.is_empty() || session_id.is_empty() {
            send_event(&self.outbound, self.id, ServerEvent::Error(MISSING_FIELDS.to_string()));
            return;
        }

        let state = self.state.clone();
        let outbound = self.outbound.clone();
        let connection_id = self.id;
        tokio::spawn(async move {
            exchange(state, connection_id, outbound, message, session_id).await;
        });
    }
}

/// Run one chat exchange: typing to the other members, the answer to all,
/// or an error to the sender alone.
async fn exchange(
    state: AppState,
    connection_id: Uuid,
    outbound: mpsc::UnboundedSender<ServerEvent>,
    message: String,
    session_id: String,
) {
    let hub = &state.hub;
    hub.publish(&session_id, Some(connection_id), ServerEvent::Typing(true));

    match state.orchestrator.chat(&message, &session_id).await {
        Ok(turn) => {
            hub.publish(&session_id, Some(connection_id), ServerEvent::Typing(false));
            let reached = hub.publish(&session_id, None, ServerEvent::MessageResponse(turn));
            debug!(session_id = %session_id, reached, "Published message response");
        }
        Err(e) => {
            error!(connection_id = %connection_id, session_id = %session_id, error = %e, "WebSocket chat failed");
            send_event(&outbound, connection_id, ServerEvent::Error(PROCESS_FAILED.to_string()));
        }
    }
}

fn send_event(outbound: &mpsc::UnboundedSender<ServerEvent>, connection_id: Uuid, event: ServerEvent) {
    if outbound.send(event).is_err() {
        debug!(connection_id = %connection_id, "Dropping event for closed connection");
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        for (_, forwarder) in self.joined.drain() {
            forwarder.abort();
        }
    }
}
