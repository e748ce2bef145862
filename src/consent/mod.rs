use axum::{
    debug_handler,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::{types::Json as Db, SqlitePool};

use crate::{
    auth::AuthUser,
    models::{Consent, PolicyAcceptance},
    AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_consent).put(update_consent))
}

async fn fetch(db_pool: &SqlitePool, user_id: &str) -> Result<Option<Consent>, sqlx::Error> {
    sqlx::query_as::<_, Consent>("SELECT * FROM consents WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(db_pool)
        .await
}

async fn fetch_or_default(db_pool: &SqlitePool, user_id: &str) -> AppResult<Consent> {
    if let Some(consent) = fetch(db_pool, user_id).await? {
        return Ok(consent);
    }

    let now = Utc::now();
    sqlx::query(
        "INSERT INTO consents
         (user_id, terms_of_service, privacy_policy, marketing_emails, data_sharing,
          created_at, updated_at)
         VALUES (?, ?, ?, 0, 0, ?, ?)",
    )
    .bind(user_id)
    .bind(Db(PolicyAcceptance::default()))
    .bind(Db(PolicyAcceptance::default()))
    .bind(now)
    .bind(now)
    .execute(db_pool)
    .await?;

    Ok(fetch(db_pool, user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("consent missing right after insert"))?)
}

#[debug_handler(state = AppState)]
async fn get_consent(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Response> {
    let consent = fetch_or_default(&db_pool, &user.id).await?;
    Ok(Json(json!({ "success": true, "data": { "consent": consent } })).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    terms_of_service: Option<bool>,
    privacy_policy: Option<bool>,
    marketing_emails: Option<bool>,
    data_sharing: Option<bool>,
}

fn acceptance(accepted: bool) -> PolicyAcceptance {
    PolicyAcceptance {
        accepted,
        // accepting stamps the time; revoking clears it
        accepted_at: accepted.then(Utc::now),
        version: "1.0".to_owned(),
    }
}

#[debug_handler(state = AppState)]
async fn update_consent(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Json(body): Json<UpdateBody>,
) -> AppResult<Response> {
    let existing = fetch_or_default(&db_pool, &user.id).await?;

    let terms = body
        .terms_of_service
        .map_or(existing.terms_of_service.0, acceptance);
    let privacy = body
        .privacy_policy
        .map_or(existing.privacy_policy.0, acceptance);

    sqlx::query(
        "UPDATE consents SET terms_of_service = ?, privacy_policy = ?, marketing_emails = ?,
         data_sharing = ?, updated_at = ? WHERE user_id = ?",
    )
    .bind(Db(terms))
    .bind(Db(privacy))
    .bind(body.marketing_emails.unwrap_or(existing.marketing_emails))
    .bind(body.data_sharing.unwrap_or(existing.data_sharing))
    .bind(Utc::now())
    .bind(&user.id)
    .execute(&db_pool)
    .await?;

    let consent = fetch_or_default(&db_pool, &user.id).await?;
    Ok(Json(json!({ "success": true, "data": { "consent": consent } })).into_response())
}
