//! Realtime relay for conversation rooms.
//!
//! One broadcast channel fans every room event out to every connected
//! socket; each socket keeps the set of rooms it joined and forwards
//! only matching events. Delivery is best-effort at-most-once: a lagged
//! receiver just skips ahead, and nothing is redelivered on reconnect.

use std::collections::HashSet;

use axum::{
    debug_handler,
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{auth::jwt, models::Message, AppError, AppResult, AppState};

/// What travels on the broadcast channel. `origin` carries the user who
/// triggered the event so typing indicators skip their own sender.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    pub conversation_id: String,
    pub origin: Option<String>,
    pub event: ServerEvent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    NewMessage {
        conversation_id: String,
        message: Message,
    },
    #[serde(rename_all = "camelCase")]
    UserTyping {
        conversation_id: String,
        user_id: String,
    },
    #[serde(rename_all = "camelCase")]
    UserStoppedTyping {
        conversation_id: String,
        user_id: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinConversation { conversation_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveConversation { conversation_id: String },
    #[serde(rename_all = "camelCase")]
    TypingStart { conversation_id: String },
    #[serde(rename_all = "camelCase")]
    TypingStop { conversation_id: String },
}

#[derive(Deserialize)]
pub(crate) struct WsQuery {
    token: Option<String>,
}

#[debug_handler]
pub(crate) async fn conversation_ws(
    Query(WsQuery { token }): Query<WsQuery>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    // the one and only auth check: token decode at connect time
    let token = token.ok_or_else(|| {
        AppError::Unauthorized("authentication error: no token provided".into())
    })?;
    let claims = jwt::verify(&token, &state.config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("authentication error: invalid token".into()))?;

    let tx = state.events.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, tx, claims.sub)))
}

async fn handle_socket(socket: WebSocket, tx: broadcast::Sender<RoomEvent>, user_id: String) {
    let mut rx = tx.subscribe();
    let (mut sender, mut receiver) = socket.split();
    let mut joined: HashSet<String> = HashSet::new();

    tracing::info!("user connected: {user_id}");

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if !joined.contains(&event.conversation_id) {
                        continue;
                    }
                    if event.origin.as_deref() == Some(user_id.as_str()) {
                        continue;
                    }
                    let Ok(text) = serde_json::to_string(&event.event) else {
                        continue;
                    };
                    if sender.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("socket for {user_id} lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = receiver.next() => {
                let Some(Ok(msg)) = msg else { break };
                let WsMessage::Text(text) = msg else { continue };
                let Ok(event) = serde_json::from_str::<ClientEvent>(&text) else {
                    continue;
                };
                handle_client_event(event, &tx, &mut joined, &user_id);
            }
        }
    }

    tracing::info!("user disconnected: {user_id}");
}

fn handle_client_event(
    event: ClientEvent,
    tx: &broadcast::Sender<RoomEvent>,
    joined: &mut HashSet<String>,
    user_id: &str,
) {
    match event {
        ClientEvent::JoinConversation { conversation_id } => {
            tracing::info!("user {user_id} joined conversation {conversation_id}");
            joined.insert(conversation_id);
        }
        ClientEvent::LeaveConversation { conversation_id } => {
            tracing::info!("user {user_id} left conversation {conversation_id}");
            joined.remove(&conversation_id);
        }
        ClientEvent::TypingStart { conversation_id } => {
            let _ = tx.send(RoomEvent {
                conversation_id: conversation_id.clone(),
                origin: Some(user_id.to_owned()),
                event: ServerEvent::UserTyping {
                    conversation_id,
                    user_id: user_id.to_owned(),
                },
            });
        }
        ClientEvent::TypingStop { conversation_id } => {
            let _ = tx.send(RoomEvent {
                conversation_id: conversation_id.clone(),
                origin: Some(user_id.to_owned()),
                event: ServerEvent::UserStoppedTyping {
                    conversation_id,
                    user_id: user_id.to_owned(),
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn server_events_use_kebab_case_tags() {
        let event = ServerEvent::NewMessage {
            conversation_id: "c1".to_owned(),
            message: Message {
                id: "m1".to_owned(),
                conversation_id: "c1".to_owned(),
                sender_id: "u1".to_owned(),
                content: "marhaba".to_owned(),
                timestamp: Utc::now(),
                is_read: false,
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "new-message");
        assert_eq!(value["data"]["conversationId"], "c1");
        assert_eq!(value["data"]["message"]["content"], "marhaba");
    }

    #[test]
    fn client_events_parse_from_kebab_case() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"join-conversation","data":{"conversationId":"c7"}}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            ClientEvent::JoinConversation { conversation_id } if conversation_id == "c7"
        ));

        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"typing-start","data":{"conversationId":"c7"}}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::TypingStart { .. }));
    }
}
