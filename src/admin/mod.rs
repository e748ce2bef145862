use axum::{
    debug_handler,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    auth::Admin,
    models::{Role, User},
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/users", get(list_users))
        .route("/users/{id}", axum::routing::put(update_user).delete(delete_user))
}

#[debug_handler(state = AppState)]
async fn stats(Admin(_admin): Admin, State(db_pool): State<SqlitePool>) -> AppResult<Response> {
    let (
        total_users,
        total_advisors,
        total_content,
        total_recommendations,
        total_conversations,
        active_users,
    ) = tokio::try_join!(
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users").fetch_one(&db_pool),
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM advisors").fetch_one(&db_pool),
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM content WHERE status = 'published'")
            .fetch_one(&db_pool),
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM recommendations").fetch_one(&db_pool),
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM conversations WHERE status = 'active'")
            .fetch_one(&db_pool),
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE is_active = 1")
            .fetch_one(&db_pool),
    )?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "stats": {
                "totalUsers": total_users,
                "totalAdvisors": total_advisors,
                "totalContent": total_content,
                "totalRecommendations": total_recommendations,
                "totalConversations": total_conversations,
                "activeUsers": active_users,
            },
        },
    }))
    .into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsersQuery {
    role: Option<Role>,
    is_active: Option<bool>,
}

#[debug_handler(state = AppState)]
async fn list_users(
    Admin(_admin): Admin,
    State(db_pool): State<SqlitePool>,
    Query(UsersQuery { role, is_active }): Query<UsersQuery>,
) -> AppResult<Response> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&db_pool)
        .await?;

    // password hashes never serialize; see the User model
    let users: Vec<User> = users
        .into_iter()
        .filter(|u| role.is_none_or(|r| u.role == r))
        .filter(|u| is_active.is_none_or(|a| u.is_active == a))
        .collect();

    Ok(Json(json!({
        "success": true,
        "count": users.len(),
        "data": { "users": users },
    }))
    .into_response())
}

async fn fetch(db_pool: &SqlitePool, id: &str) -> AppResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserBody {
    name: Option<String>,
    role: Option<Role>,
    is_active: Option<bool>,
}

#[debug_handler(state = AppState)]
async fn update_user(
    Admin(_admin): Admin,
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserBody>,
) -> AppResult<Response> {
    let user = fetch(&db_pool, &id).await?;

    sqlx::query("UPDATE users SET name = ?, role = ?, is_active = ?, updated_at = ? WHERE id = ?")
        .bind(body.name.unwrap_or(user.name))
        .bind(body.role.unwrap_or(user.role))
        .bind(body.is_active.unwrap_or(user.is_active))
        .bind(Utc::now())
        .bind(&id)
        .execute(&db_pool)
        .await?;

    let user = fetch(&db_pool, &id).await?;
    Ok(Json(json!({ "success": true, "data": { "user": user } })).into_response())
}

#[debug_handler(state = AppState)]
async fn delete_user(
    Admin(_admin): Admin,
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let user = fetch(&db_pool, &id).await?;

    // best-effort cleanup of owned rows before the account itself
    tokio::try_join!(
        sqlx::query("DELETE FROM investor_profiles WHERE user_id = ?")
            .bind(&user.id)
            .execute(&db_pool),
        sqlx::query("DELETE FROM advisors WHERE user_id = ?")
            .bind(&user.id)
            .execute(&db_pool),
        sqlx::query("DELETE FROM recommendations WHERE user_id = ?")
            .bind(&user.id)
            .execute(&db_pool),
    )?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&id)
        .execute(&db_pool)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "user and associated data deleted successfully",
    }))
    .into_response())
}
