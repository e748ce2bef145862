mod engine;

use axum::{
    debug_handler,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    auth::AuthUser,
    models::{Recommendation, RecommendationStatus},
    profiles, AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/generate", post(generate))
        .route(
            "/{id}",
            get(get_by_id).put(update_status).delete(delete_by_id),
        )
}

#[derive(Deserialize)]
struct ListQuery {
    status: Option<RecommendationStatus>,
}

#[debug_handler(state = AppState)]
async fn list(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Query(ListQuery { status }): Query<ListQuery>,
) -> AppResult<Response> {
    let recommendations = sqlx::query_as::<_, Recommendation>(
        "SELECT * FROM recommendations WHERE user_id = ? ORDER BY match_score DESC",
    )
    .bind(&user.id)
    .fetch_all(&db_pool)
    .await?;

    let recommendations: Vec<Recommendation> = recommendations
        .into_iter()
        .filter(|r| status.is_none_or(|s| r.status == s))
        .collect();

    Ok(Json(json!({
        "success": true,
        "count": recommendations.len(),
        "data": { "recommendations": recommendations },
    }))
    .into_response())
}

#[debug_handler(state = AppState)]
async fn generate(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Response> {
    let Some(profile) = profiles::fetch(&db_pool, &user.id).await? else {
        return Err(AppError::BadRequest(
            "please complete your investor profile first".into(),
        ));
    };

    let recommendations = engine::generate(&db_pool, &profile).await?;

    Ok(Json(json!({
        "success": true,
        "count": recommendations.len(),
        "data": { "recommendations": recommendations },
    }))
    .into_response())
}

async fn fetch_owned(
    db_pool: &SqlitePool,
    id: &str,
    user_id: &str,
) -> AppResult<Recommendation> {
    let recommendation =
        sqlx::query_as::<_, Recommendation>("SELECT * FROM recommendations WHERE id = ?")
            .bind(id)
            .fetch_optional(db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound("recommendation not found".into()))?;

    if recommendation.user_id != user_id {
        return Err(AppError::Forbidden(
            "not authorized to access this recommendation".into(),
        ));
    }
    Ok(recommendation)
}

#[debug_handler(state = AppState)]
async fn get_by_id(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let recommendation = fetch_owned(&db_pool, &id, &user.id).await?;
    Ok(
        Json(json!({ "success": true, "data": { "recommendation": recommendation } }))
            .into_response(),
    )
}

#[derive(Deserialize)]
struct StatusBody {
    status: RecommendationStatus,
}

#[debug_handler(state = AppState)]
async fn update_status(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
    Json(StatusBody { status }): Json<StatusBody>,
) -> AppResult<Response> {
    fetch_owned(&db_pool, &id, &user.id).await?;

    sqlx::query("UPDATE recommendations SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(Utc::now())
        .bind(&id)
        .execute(&db_pool)
        .await?;

    let recommendation = fetch_owned(&db_pool, &id, &user.id).await?;

    Ok(
        Json(json!({ "success": true, "data": { "recommendation": recommendation } }))
            .into_response(),
    )
}

#[debug_handler(state = AppState)]
async fn delete_by_id(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    fetch_owned(&db_pool, &id, &user.id).await?;

    sqlx::query("DELETE FROM recommendations WHERE id = ?")
        .bind(&id)
        .execute(&db_pool)
        .await?;

    Ok(
        Json(json!({ "success": true, "message": "recommendation deleted successfully" }))
            .into_response(),
    )
}
