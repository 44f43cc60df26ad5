//! WebSocket server for real-time pickup notifications

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::auth::JwtConfig;
use crate::error::{ApiError, ServiceResult};
use crate::integrations::{NotificationDispatcher, PickupEvent, UserNotification};

/// WebSocket server state
#[derive(Clone)]
pub struct WsState {
    /// Broadcast channel for user notifications
    pub tx: broadcast::Sender<UserNotification>,
    /// Connected clients registry
    pub clients: Arc<RwLock<HashMap<Uuid, ClientInfo>>>,
}

/// Client connection information
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub user_id: Uuid,
    /// Empty means every pickup of the user
    pub subscribed_pickups: Vec<Uuid>,
}

impl ClientInfo {
    fn wants(&self, notification: &UserNotification) -> bool {
        notification.user_id == self.user_id
            && (self.subscribed_pickups.is_empty()
                || self
                    .subscribed_pickups
                    .contains(&notification.event.pickup_id()))
    }
}

/// Client message types
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    Subscribe { pickup_ids: Vec<Uuid> },
    Unsubscribe { pickup_ids: Vec<Uuid> },
    Ping,
}

/// Server message types
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerMessage {
    Notification { notification: UserNotification },
    Subscribed { pickup_ids: Vec<Uuid> },
    Unsubscribed { pickup_ids: Vec<Uuid> },
    Pong,
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

impl WsState {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            tx,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn connected_clients(&self) -> usize {
        self.clients.read().await.len()
    }

    async fn register_client(&self, client_id: Uuid, user_id: Uuid) {
        self.clients.write().await.insert(
            client_id,
            ClientInfo {
                user_id,
                subscribed_pickups: vec![],
            },
        );
        tracing::info!(client_id = %client_id, user_id = %user_id, "WebSocket client connected");
    }

    async fn unregister_client(&self, client_id: Uuid) {
        self.clients.write().await.remove(&client_id);
        tracing::info!(client_id = %client_id, "WebSocket client disconnected");
    }

    async fn update_subscriptions<F>(&self, client_id: Uuid, update: F)
    where
        F: FnOnce(&mut Vec<Uuid>),
    {
        if let Some(client) = self.clients.write().await.get_mut(&client_id) {
            update(&mut client.subscribed_pickups);
        }
    }
}

#[async_trait]
impl NotificationDispatcher for WsState {
    async fn notify(&self, user_id: Uuid, event: PickupEvent) -> ServiceResult<()> {
        let notification = UserNotification {
            user_id,
            event,
            created_at: chrono::Utc::now(),
        };
        // No receivers just means nobody is connected right now
        if self.tx.send(notification).is_err() {
            tracing::debug!(user_id = %user_id, "No WebSocket clients connected for notification");
        }
        Ok(())
    }
}

/// Browsers cannot set headers on the upgrade request, so the token
/// travels in the query string.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// WebSocket handler - authenticates, then upgrades the connection
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsAuthQuery>,
    State(state): State<WsState>,
    State(jwt): State<Arc<JwtConfig>>,
) -> Response {
    let user_id = match jwt.verify(&query.token).and_then(|claims| claims.user_id()) {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::debug!("Rejected WebSocket upgrade: {}", e);
            return ApiError::Unauthorized("Invalid token".to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: WsState, user_id: Uuid) {
    let client_id = Uuid::new_v4();
    state.register_client(client_id, user_id).await;

    let (mut sender, mut receiver) = socket.split();
    let (internal_tx, mut internal_rx) = mpsc::channel::<ServerMessage>(32);

    let mut rx = state.tx.subscribe();
    let state_send = state.clone();

    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                received = rx.recv() => match received {
                    Ok(notification) => {
                        let wanted = state_send
                            .clients
                            .read()
                            .await
                            .get(&client_id)
                            .map_or(false, |client| client.wants(&notification));
                        if !wanted {
                            continue;
                        }
                        ServerMessage::Notification { notification }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(client_id = %client_id, skipped, "WebSocket client lagging");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(msg) = internal_rx.recv() => msg,
                else => break,
            };

            if let Ok(text) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    let state_recv = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) else {
                continue;
            };
            let response = match client_msg {
                ClientMessage::Subscribe { pickup_ids } => {
                    let ids = pickup_ids.clone();
                    state_recv
                        .update_subscriptions(client_id, |subs| {
                            for id in ids {
                                if !subs.contains(&id) {
                                    subs.push(id);
                                }
                            }
                        })
                        .await;
                    ServerMessage::Subscribed { pickup_ids }
                }
                ClientMessage::Unsubscribe { pickup_ids } => {
                    let ids = pickup_ids.clone();
                    state_recv
                        .update_subscriptions(client_id, |subs| subs.retain(|id| !ids.contains(id)))
                        .await;
                    ServerMessage::Unsubscribed { pickup_ids }
                }
                ClientMessage::Ping => ServerMessage::Pong,
            };
            if internal_tx.send(response).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.unregister_client(client_id).await;
}
