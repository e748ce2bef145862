use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::{types::Json as Db, SqlitePool};
use uuid::Uuid;

use crate::{
    auth::{require_role, Admin, AuthUser},
    models::{Content, ContentStatus, ContentType, Role},
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_by_id).put(update).delete(delete_by_id))
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(rename = "type")]
    kind: Option<ContentType>,
    category: Option<String>,
    status: Option<ContentStatus>,
}

async fn with_author(db_pool: &SqlitePool, content: Content) -> AppResult<serde_json::Value> {
    let author: Option<(String, String)> =
        sqlx::query_as("SELECT name, email FROM users WHERE id = ?")
            .bind(&content.author_id)
            .fetch_optional(db_pool)
            .await?;

    let mut value = serde_json::to_value(&content)?;
    if let Some((name, email)) = author {
        value["author"] = json!({ "id": content.author_id, "name": name, "email": email });
    }
    Ok(value)
}

#[debug_handler]
async fn list(
    State(db_pool): State<SqlitePool>,
    Query(ListQuery {
        kind,
        category,
        status,
    }): Query<ListQuery>,
) -> AppResult<Response> {
    let status = status.unwrap_or(ContentStatus::Published);

    let rows = sqlx::query_as::<_, Content>(
        "SELECT * FROM content WHERE status = ? ORDER BY published_at DESC",
    )
    .bind(status)
    .fetch_all(&db_pool)
    .await?;

    let mut listed = Vec::new();
    for content in rows {
        if kind.is_some_and(|k| content.kind != k) {
            continue;
        }
        if category.as_ref().is_some_and(|c| &content.category != c) {
            continue;
        }
        listed.push(with_author(&db_pool, content).await?);
    }

    Ok(Json(json!({
        "success": true,
        "count": listed.len(),
        "data": { "content": listed },
    }))
    .into_response())
}

async fn fetch(db_pool: &SqlitePool, id: &str) -> AppResult<Content> {
    sqlx::query_as::<_, Content>("SELECT * FROM content WHERE id = ?")
        .bind(id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("content not found".into()))
}

#[debug_handler]
async fn get_by_id(
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let mut content = fetch(&db_pool, &id).await?;

    sqlx::query("UPDATE content SET views = views + 1 WHERE id = ?")
        .bind(&id)
        .execute(&db_pool)
        .await?;
    content.views += 1;

    let content = with_author(&db_pool, content).await?;
    Ok(Json(json!({ "success": true, "data": { "content": content } })).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    title: String,
    description: String,
    #[serde(rename = "type")]
    kind: ContentType,
    category: String,
    #[serde(alias = "body")]
    content: String,
    #[serde(default)]
    tags: Vec<String>,
    image_url: Option<String>,
    video_url: Option<String>,
    is_premium: Option<bool>,
    status: Option<ContentStatus>,
}

#[debug_handler(state = AppState)]
async fn create(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Json(body): Json<CreateBody>,
) -> AppResult<Response> {
    require_role(&user, &[Role::Advisor, Role::Admin])?;

    let id = Uuid::now_v7().to_string();
    let now = Utc::now();
    let status = body.status.unwrap_or(ContentStatus::Draft);
    let published_at = (status == ContentStatus::Published).then_some(now);

    sqlx::query(
        "INSERT INTO content
         (id, title, description, kind, category, body, author_id, tags, image_url,
          video_url, is_premium, views, likes, status, published_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&body.title)
    .bind(&body.description)
    .bind(body.kind)
    .bind(&body.category)
    .bind(&body.content)
    .bind(&user.id)
    .bind(Db(body.tags))
    .bind(&body.image_url)
    .bind(&body.video_url)
    .bind(body.is_premium.unwrap_or(false))
    .bind(status)
    .bind(published_at)
    .bind(now)
    .bind(now)
    .execute(&db_pool)
    .await?;

    let content = fetch(&db_pool, &id).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": { "content": content } })),
    )
        .into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    kind: Option<ContentType>,
    category: Option<String>,
    #[serde(alias = "body")]
    content: Option<String>,
    tags: Option<Vec<String>>,
    image_url: Option<String>,
    video_url: Option<String>,
    is_premium: Option<bool>,
    status: Option<ContentStatus>,
}

#[debug_handler(state = AppState)]
async fn update(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
    Json(body): Json<UpdateBody>,
) -> AppResult<Response> {
    require_role(&user, &[Role::Advisor, Role::Admin])?;

    let existing = fetch(&db_pool, &id).await?;
    if existing.author_id != user.id && user.role != Role::Admin {
        return Err(AppError::Forbidden(
            "not authorized to update this content".into(),
        ));
    }

    let now = Utc::now();
    let status = body.status.unwrap_or(existing.status);
    // first transition into published stamps the publication time
    let published_at = match (existing.published_at, status) {
        (None, ContentStatus::Published) => Some(now),
        (existing_at, _) => existing_at,
    };

    sqlx::query(
        "UPDATE content SET title = ?, description = ?, kind = ?, category = ?, body = ?,
         tags = ?, image_url = ?, video_url = ?, is_premium = ?, status = ?, published_at = ?,
         updated_at = ? WHERE id = ?",
    )
    .bind(body.title.unwrap_or(existing.title))
    .bind(body.description.unwrap_or(existing.description))
    .bind(body.kind.unwrap_or(existing.kind))
    .bind(body.category.unwrap_or(existing.category))
    .bind(body.content.unwrap_or(existing.body))
    .bind(Db(body.tags.unwrap_or(existing.tags.0)))
    .bind(body.image_url.or(existing.image_url))
    .bind(body.video_url.or(existing.video_url))
    .bind(body.is_premium.unwrap_or(existing.is_premium))
    .bind(status)
    .bind(published_at)
    .bind(now)
    .bind(&id)
    .execute(&db_pool)
    .await?;

    let content = fetch(&db_pool, &id).await?;
    Ok(Json(json!({ "success": true, "data": { "content": content } })).into_response())
}

#[debug_handler(state = AppState)]
async fn delete_by_id(
    Admin(_admin): Admin,
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    fetch(&db_pool, &id).await?;

    sqlx::query("DELETE FROM content WHERE id = ?")
        .bind(&id)
        .execute(&db_pool)
        .await?;

    Ok(Json(json!({ "success": true, "message": "content deleted successfully" })).into_response())
}
