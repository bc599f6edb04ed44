// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket connection manager and event feed.
//!
//! Each socket owns a subscription set of workflow ids (empty set ⇒
//! subscribed to all). Connecting with `?since=<event_id>` replays every
//! later event the store still holds, then `backfill_complete`; a pruned
//! anchor yields `backfill_expired` and the client re-syncs over REST. The
//! bus is lossy under pressure, so clients watch per-workflow sequence
//! numbers and refresh through REST when they see a gap.

use crate::lifecycle::AppState;
use am_core::event::WorkflowEvent;
use am_core::workflow::WorkflowId;
use am_engine::{BusMessage, SubscriptionFilter};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

am_core::define_id! {
    /// Unique identifier for a WebSocket connection.
    pub struct ConnectionId("con-");
}

/// Close code sent when the server shuts down.
const CLOSE_GOING_AWAY: u16 = 1001;

/// Client → server payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { workflow_id: String },
    Unsubscribe { workflow_id: String },
    SubscribeAll,
    Pong,
}

/// Server → client payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Event { event: WorkflowEvent },
    Ping,
    BackfillComplete { count: usize },
    BackfillExpired,
}

/// Which workflows a connection wants. Empty ⇒ all.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    workflows: HashSet<WorkflowId>,
}

impl SubscriptionSet {
    pub fn matches(&self, workflow_id: &WorkflowId) -> bool {
        self.workflows.is_empty() || self.workflows.contains(workflow_id)
    }

    pub fn subscribe(&mut self, workflow_id: WorkflowId) {
        self.workflows.insert(workflow_id);
    }

    pub fn unsubscribe(&mut self, workflow_id: &WorkflowId) {
        self.workflows.remove(workflow_id);
    }

    pub fn subscribe_all(&mut self) {
        self.workflows.clear();
    }
}

struct ConnectionHandle {
    subscriptions: Arc<Mutex<SubscriptionSet>>,
    close: CancellationToken,
}

/// Owns the socket ↔ subscription-set mapping.
#[derive(Default)]
pub struct ConnectionManager {
    connections: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(
        &self,
        subscriptions: Arc<Mutex<SubscriptionSet>>,
        close: CancellationToken,
    ) -> ConnectionId {
        let id = ConnectionId::new();
        self.connections.lock().insert(id, ConnectionHandle { subscriptions, close });
        id
    }

    fn unregister(&self, id: &ConnectionId) {
        self.connections.lock().remove(id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Signal every socket task to send its close frame and exit, then drop
    /// the registry. Used by shutdown.
    pub async fn close_all(&self) {
        let handles: Vec<ConnectionHandle> = {
            let mut connections = self.connections.lock();
            connections.drain().map(|(_, handle)| handle).collect()
        };
        if !handles.is_empty() {
            info!(count = handles.len(), "closing websocket connections");
        }
        for handle in handles {
            handle.close.cancel();
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Last event id the client saw before disconnecting
    pub since: Option<String>,
}

/// `GET /ws/events` upgrade handler.
pub async fn ws_events(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket, query.since))
}

async fn handle_socket(state: AppState, socket: WebSocket, since: Option<String>) {
    let subscriptions = Arc::new(Mutex::new(SubscriptionSet::default()));
    let close = CancellationToken::new();
    let conn_id = state.connections.register(Arc::clone(&subscriptions), close.clone());
    debug!(connection_id = %conn_id, "websocket connected");

    // Subscribe before backfill so no event can fall between replay and live.
    let mut bus = state.bus.subscribe(SubscriptionFilter::all());
    let (mut sender, receiver) = socket.split();

    if let Some(since) = since {
        if !backfill(&state, &mut sender, &subscriptions, &since).await {
            state.connections.unregister(&conn_id);
            return;
        }
    }

    pump(&state, &mut sender, receiver, &mut bus, &subscriptions, &close).await;

    state.connections.unregister(&conn_id);
    debug!(connection_id = %conn_id, "websocket disconnected");
}

/// Replay events after `since`. Returns false when the socket died.
async fn backfill(
    state: &AppState,
    sender: &mut SplitSink<WebSocket, Message>,
    subscriptions: &Mutex<SubscriptionSet>,
    since: &str,
) -> bool {
    match state.db.events_after(since) {
        Err(e) => {
            warn!(error = %e, "backfill query failed");
            false
        }
        Ok(None) => send(sender, &ServerMessage::BackfillExpired).await.is_ok(),
        Ok(Some(events)) => {
            let mut count = 0usize;
            for event in events {
                if !subscriptions.lock().matches(&event.workflow_id) {
                    continue;
                }
                if send(sender, &ServerMessage::Event { event }).await.is_err() {
                    return false;
                }
                count += 1;
            }
            send(sender, &ServerMessage::BackfillComplete { count }).await.is_ok()
        }
    }
}

async fn pump(
    state: &AppState,
    sender: &mut SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    bus: &mut am_engine::BusSubscription,
    subscriptions: &Mutex<SubscriptionSet>,
    close: &CancellationToken,
) {
    let mut heartbeat = tokio::time::interval(state.config.ws_heartbeat);
    heartbeat.tick().await;
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            _ = close.cancelled() => {
                let _ = sender
                    .send(Message::Close(Some(CloseFrame {
                        code: CLOSE_GOING_AWAY,
                        reason: "server shutting down".into(),
                    })))
                    .await;
                return;
            }

            incoming = receiver.next() => {
                last_activity = Instant::now();
                match incoming {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&text, subscriptions);
                    }
                    // Protocol-level ping/pong only refresh the idle clock
                    Some(Ok(_)) => {}
                }
            }

            message = bus.recv() => {
                match message {
                    None => return,
                    Some(BusMessage::Lagged(count)) => {
                        // Lossy by design: the client notices the sequence
                        // gap and refreshes from the store over REST.
                        warn!(dropped = count, "websocket feed lagged the bus");
                    }
                    Some(BusMessage::Event(event)) => {
                        if subscriptions.lock().matches(&event.workflow_id) {
                            let message = ServerMessage::Event { event: (*event).clone() };
                            if send(sender, &message).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }

            _ = heartbeat.tick() => {
                if last_activity.elapsed() > state.config.ws_idle_timeout {
                    info!("closing idle websocket");
                    return;
                }
                if send(sender, &ServerMessage::Ping).await.is_err() {
                    return;
                }
            }
        }
    }
}

fn handle_client_message(text: &str, subscriptions: &Mutex<SubscriptionSet>) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { workflow_id }) => {
            subscriptions.lock().subscribe(WorkflowId::from_string(workflow_id));
        }
        Ok(ClientMessage::Unsubscribe { workflow_id }) => {
            subscriptions.lock().unsubscribe(&WorkflowId::from_string(workflow_id));
        }
        Ok(ClientMessage::SubscribeAll) => {
            subscriptions.lock().subscribe_all();
        }
        Ok(ClientMessage::Pong) => {}
        Err(e) => {
            debug!(error = %e, "ignoring malformed websocket message");
        }
    }
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).unwrap_or_default();
    sender.send(Message::Text(json.into())).await
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
