mod ws;

pub use ws::{RoomEvent, ServerEvent};

use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    models::{Conversation, Message},
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/ws", get(ws::conversation_ws))
        .route("/{id}", get(get_by_id))
        .route("/{id}/messages", post(add_message))
        .route("/{id}/archive", put(archive))
}

async fn participants_json(
    db_pool: &SqlitePool,
    conversation: &Conversation,
) -> AppResult<serde_json::Value> {
    let mut participants = Vec::with_capacity(2);
    for user_id in [&conversation.participant_a, &conversation.participant_b] {
        let user: Option<(String, String)> =
            sqlx::query_as("SELECT name, email FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(db_pool)
                .await?;
        if let Some((name, email)) = user {
            participants.push(json!({ "id": user_id, "name": name, "email": email }));
        }
    }
    Ok(serde_json::Value::Array(participants))
}

async fn conversation_json(
    db_pool: &SqlitePool,
    conversation: &Conversation,
    include_messages: bool,
) -> AppResult<serde_json::Value> {
    let mut value = serde_json::to_value(conversation)?;
    value["participants"] = participants_json(db_pool, conversation).await?;
    if include_messages {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE conversation_id = ? ORDER BY timestamp, id",
        )
        .bind(&conversation.id)
        .fetch_all(db_pool)
        .await?;
        value["messages"] = serde_json::to_value(&messages)?;
    }
    Ok(value)
}

#[debug_handler(state = AppState)]
async fn list(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Response> {
    let conversations = sqlx::query_as::<_, Conversation>(
        "SELECT * FROM conversations
         WHERE (participant_a = ? OR participant_b = ?) AND status = 'active'
         ORDER BY last_message_at DESC",
    )
    .bind(&user.id)
    .bind(&user.id)
    .fetch_all(&db_pool)
    .await?;

    let mut listed = Vec::new();
    for conversation in &conversations {
        listed.push(conversation_json(&db_pool, conversation, false).await?);
    }

    Ok(Json(json!({
        "success": true,
        "count": listed.len(),
        "data": { "conversations": listed },
    }))
    .into_response())
}

async fn fetch(db_pool: &SqlitePool, id: &str) -> AppResult<Conversation> {
    sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = ?")
        .bind(id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("conversation not found".into()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    participant_id: Option<String>,
}

#[debug_handler(state = AppState)]
async fn create(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Json(CreateBody { participant_id }): Json<CreateBody>,
) -> AppResult<Response> {
    let Some(participant_id) = participant_id else {
        return Err(AppError::BadRequest("participant ID is required".into()));
    };
    if participant_id == user.id {
        return Err(AppError::BadRequest(
            "cannot start a conversation with yourself".into(),
        ));
    }

    // one conversation per pair, regardless of who started it
    let existing = sqlx::query_as::<_, Conversation>(
        "SELECT * FROM conversations
         WHERE (participant_a = ? AND participant_b = ?)
            OR (participant_a = ? AND participant_b = ?)",
    )
    .bind(&user.id)
    .bind(&participant_id)
    .bind(&participant_id)
    .bind(&user.id)
    .fetch_optional(&db_pool)
    .await?;

    let conversation = match existing {
        Some(conversation) => conversation,
        None => {
            let id = Uuid::now_v7().to_string();
            let now = Utc::now();
            sqlx::query(
                "INSERT INTO conversations
                 (id, participant_a, participant_b, status, created_at, updated_at)
                 VALUES (?, ?, ?, 'active', ?, ?)",
            )
            .bind(&id)
            .bind(&user.id)
            .bind(&participant_id)
            .bind(now)
            .bind(now)
            .execute(&db_pool)
            .await?;
            fetch(&db_pool, &id).await?
        }
    };

    let conversation = conversation_json(&db_pool, &conversation, true).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": { "conversation": conversation } })),
    )
        .into_response())
}

#[debug_handler(state = AppState)]
async fn get_by_id(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conversation = fetch(&db_pool, &id).await?;
    if !conversation.has_participant(&user.id) {
        return Err(AppError::Forbidden(
            "not authorized to view this conversation".into(),
        ));
    }

    // reading the thread marks the other side's messages as read
    sqlx::query("UPDATE messages SET is_read = 1 WHERE conversation_id = ? AND sender_id <> ?")
        .bind(&id)
        .bind(&user.id)
        .execute(&db_pool)
        .await?;

    let conversation = conversation_json(&db_pool, &conversation, true).await?;
    Ok(
        Json(json!({ "success": true, "data": { "conversation": conversation } }))
            .into_response(),
    )
}

#[derive(Deserialize)]
struct MessageBody {
    content: String,
}

#[debug_handler(state = AppState)]
async fn add_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(MessageBody { content }): Json<MessageBody>,
) -> AppResult<Response> {
    if content.trim().is_empty() {
        return Err(AppError::BadRequest("message content is required".into()));
    }

    let conversation = fetch(&state.db_pool, &id).await?;
    if !conversation.has_participant(&user.id) {
        return Err(AppError::Forbidden(
            "not authorized to add message to this conversation".into(),
        ));
    }

    let message_id = Uuid::now_v7().to_string();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO messages (id, conversation_id, sender_id, content, timestamp, is_read)
         VALUES (?, ?, ?, ?, ?, 0)",
    )
    .bind(&message_id)
    .bind(&id)
    .bind(&user.id)
    .bind(&content)
    .bind(now)
    .execute(&state.db_pool)
    .await?;

    sqlx::query(
        "UPDATE conversations SET last_message = ?, last_message_at = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&content)
    .bind(now)
    .bind(now)
    .bind(&id)
    .execute(&state.db_pool)
    .await?;

    let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
        .bind(&message_id)
        .fetch_one(&state.db_pool)
        .await?;

    // relay after the write has landed; best-effort, no subscribers is fine
    notify(&state.events, &id, message.clone());

    let conversation = fetch(&state.db_pool, &id).await?;
    let conversation = conversation_json(&state.db_pool, &conversation, true).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": { "conversation": conversation } })),
    )
        .into_response())
}

fn notify(events: &broadcast::Sender<RoomEvent>, conversation_id: &str, message: Message) {
    let _ = events.send(RoomEvent {
        conversation_id: conversation_id.to_owned(),
        origin: None,
        event: ServerEvent::NewMessage {
            conversation_id: conversation_id.to_owned(),
            message,
        },
    });
}

#[debug_handler(state = AppState)]
async fn archive(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conversation = fetch(&db_pool, &id).await?;
    if !conversation.has_participant(&user.id) {
        return Err(AppError::Forbidden(
            "not authorized to archive this conversation".into(),
        ));
    }

    sqlx::query("UPDATE conversations SET status = 'archived', updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(&id)
        .execute(&db_pool)
        .await?;

    Ok(
        Json(json!({ "success": true, "message": "conversation archived successfully" }))
            .into_response(),
    )
}
