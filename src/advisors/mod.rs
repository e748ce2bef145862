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
    models::{Advisor, Availability, Role},
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_by_id).put(update).delete(delete_by_id))
}

#[derive(Deserialize)]
struct ListQuery {
    specialization: Option<String>,
    available: Option<bool>,
}

async fn with_user(db_pool: &SqlitePool, advisor: Advisor) -> AppResult<serde_json::Value> {
    let user: Option<(String, String, Option<String>)> =
        sqlx::query_as("SELECT name, email, phone_number FROM users WHERE id = ?")
            .bind(&advisor.user_id)
            .fetch_optional(db_pool)
            .await?;

    let mut value = serde_json::to_value(&advisor)?;
    if let Some((name, email, phone_number)) = user {
        value["user"] = json!({
            "id": advisor.user_id,
            "name": name,
            "email": email,
            "phoneNumber": phone_number,
        });
    }
    Ok(value)
}

#[debug_handler]
async fn list(
    State(db_pool): State<SqlitePool>,
    Query(ListQuery {
        specialization,
        available,
    }): Query<ListQuery>,
) -> AppResult<Response> {
    let advisors =
        sqlx::query_as::<_, Advisor>("SELECT * FROM advisors ORDER BY rating DESC")
            .fetch_all(&db_pool)
            .await?;

    let mut listed = Vec::new();
    for advisor in advisors {
        if specialization
            .as_ref()
            .is_some_and(|wanted| !advisor.specialization.0.iter().any(|s| s == wanted))
        {
            continue;
        }
        if available.is_some_and(|wanted| advisor.is_available != wanted) {
            continue;
        }
        listed.push(with_user(&db_pool, advisor).await?);
    }

    Ok(Json(json!({
        "success": true,
        "count": listed.len(),
        "data": { "advisors": listed },
    }))
    .into_response())
}

#[debug_handler]
async fn get_by_id(
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let advisor = fetch(&db_pool, &id).await?;
    let advisor = with_user(&db_pool, advisor).await?;
    Ok(Json(json!({ "success": true, "data": { "advisor": advisor } })).into_response())
}

async fn fetch(db_pool: &SqlitePool, id: &str) -> AppResult<Advisor> {
    sqlx::query_as::<_, Advisor>("SELECT * FROM advisors WHERE id = ?")
        .bind(id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("advisor not found".into()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    user_id: String,
    specialization: Vec<String>,
    experience: i64,
    #[serde(default)]
    certifications: Vec<String>,
    languages: Option<Vec<String>>,
    bio: String,
    availability: Option<Availability>,
    hourly_rate: Option<f64>,
    is_available: Option<bool>,
}

#[debug_handler(state = AppState)]
async fn create(
    Admin(_admin): Admin,
    State(db_pool): State<SqlitePool>,
    Json(body): Json<CreateBody>,
) -> AppResult<Response> {
    let user_role = sqlx::query_scalar::<_, Role>("SELECT role FROM users WHERE id = ?")
        .bind(&body.user_id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;

    // becoming an advisor promotes the underlying account
    if user_role != Role::Advisor {
        sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(Role::Advisor)
            .bind(Utc::now())
            .bind(&body.user_id)
            .execute(&db_pool)
            .await?;
    }

    let id = Uuid::now_v7().to_string();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO advisors
         (id, user_id, specialization, experience, certifications, languages, bio,
          availability, rating, review_count, hourly_rate, is_available, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&body.user_id)
    .bind(Db(body.specialization))
    .bind(body.experience)
    .bind(Db(body.certifications))
    .bind(Db(body.languages.unwrap_or_else(|| vec!["Arabic".to_owned()])))
    .bind(&body.bio)
    .bind(Db(body.availability.unwrap_or_default()))
    .bind(body.hourly_rate)
    .bind(body.is_available.unwrap_or(true))
    .bind(now)
    .bind(now)
    .execute(&db_pool)
    .await?;

    let advisor = fetch(&db_pool, &id).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": { "advisor": advisor } })),
    )
        .into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    specialization: Option<Vec<String>>,
    experience: Option<i64>,
    certifications: Option<Vec<String>>,
    languages: Option<Vec<String>>,
    bio: Option<String>,
    availability: Option<Availability>,
    hourly_rate: Option<f64>,
    is_available: Option<bool>,
}

#[debug_handler(state = AppState)]
async fn update(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
    Json(body): Json<UpdateBody>,
) -> AppResult<Response> {
    require_role(&user, &[Role::Advisor, Role::Admin])?;

    let advisor = fetch(&db_pool, &id).await?;
    if advisor.user_id != user.id && user.role != Role::Admin {
        return Err(AppError::Forbidden(
            "not authorized to update this advisor profile".into(),
        ));
    }

    sqlx::query(
        "UPDATE advisors SET specialization = ?, experience = ?, certifications = ?,
         languages = ?, bio = ?, availability = ?, hourly_rate = ?, is_available = ?,
         updated_at = ? WHERE id = ?",
    )
    .bind(Db(body.specialization.unwrap_or(advisor.specialization.0)))
    .bind(body.experience.unwrap_or(advisor.experience))
    .bind(Db(body.certifications.unwrap_or(advisor.certifications.0)))
    .bind(Db(body.languages.unwrap_or(advisor.languages.0)))
    .bind(body.bio.unwrap_or(advisor.bio))
    .bind(Db(body.availability.unwrap_or(advisor.availability.0)))
    .bind(body.hourly_rate.or(advisor.hourly_rate))
    .bind(body.is_available.unwrap_or(advisor.is_available))
    .bind(Utc::now())
    .bind(&id)
    .execute(&db_pool)
    .await?;

    let advisor = fetch(&db_pool, &id).await?;
    Ok(Json(json!({ "success": true, "data": { "advisor": advisor } })).into_response())
}

#[debug_handler(state = AppState)]
async fn delete_by_id(
    Admin(_admin): Admin,
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    fetch(&db_pool, &id).await?;

    sqlx::query("DELETE FROM advisors WHERE id = ?")
        .bind(&id)
        .execute(&db_pool)
        .await?;

    Ok(
        Json(json!({ "success": true, "message": "advisor profile deleted successfully" }))
            .into_response(),
    )
}
