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
    models::{BudgetRange, InvestmentHorizon, InvestorProfile, PropertyType, ReturnType, RiskLevel},
    AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/",
        get(get_profile).put(update_profile).delete(delete_profile),
    )
}

pub(crate) async fn fetch(
    db_pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<InvestorProfile>, sqlx::Error> {
    sqlx::query_as::<_, InvestorProfile>("SELECT * FROM investor_profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(db_pool)
        .await
}

#[debug_handler(state = AppState)]
async fn get_profile(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Response> {
    let profile = match fetch(&db_pool, &user.id).await? {
        Some(profile) => profile,
        None => {
            // first access creates an empty default profile
            let now = Utc::now();
            sqlx::query(
                "INSERT INTO investor_profiles
                 (user_id, investment_goals, budget_range, preferred_locations, property_types,
                  investment_horizon, risk_tolerance, preferred_return_type, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&user.id)
            .bind(Db(Vec::<String>::new()))
            .bind(Db(BudgetRange { min: 0.0, max: 0.0 }))
            .bind(Db(Vec::<String>::new()))
            .bind(Db(Vec::<PropertyType>::new()))
            .bind(InvestmentHorizon::Medium)
            .bind(RiskLevel::Medium)
            .bind(ReturnType::Both)
            .bind(now)
            .bind(now)
            .execute(&db_pool)
            .await?;

            fetch(&db_pool, &user.id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("profile missing right after insert"))?
        }
    };

    Ok(Json(json!({ "success": true, "data": { "profile": profile } })).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileBody {
    investment_goals: Option<Vec<String>>,
    budget_range: Option<BudgetRange>,
    preferred_locations: Option<Vec<String>>,
    property_types: Option<Vec<PropertyType>>,
    investment_horizon: Option<InvestmentHorizon>,
    risk_tolerance: Option<RiskLevel>,
    preferred_return_type: Option<ReturnType>,
    additional_notes: Option<String>,
}

#[debug_handler(state = AppState)]
async fn update_profile(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Json(body): Json<ProfileBody>,
) -> AppResult<Response> {
    let existing = fetch(&db_pool, &user.id).await?;
    let now = Utc::now();

    // merge over the stored row (or defaults on first write), then upsert
    let (goals, budget, locations, types, horizon, risk, return_type, notes, created_at) =
        match existing {
            Some(p) => (
                body.investment_goals.unwrap_or(p.investment_goals.0),
                body.budget_range.unwrap_or(p.budget_range.0),
                body.preferred_locations.unwrap_or(p.preferred_locations.0),
                body.property_types.unwrap_or(p.property_types.0),
                body.investment_horizon.unwrap_or(p.investment_horizon),
                body.risk_tolerance.unwrap_or(p.risk_tolerance),
                body.preferred_return_type.unwrap_or(p.preferred_return_type),
                body.additional_notes.or(p.additional_notes),
                p.created_at,
            ),
            None => (
                body.investment_goals.unwrap_or_default(),
                body.budget_range.unwrap_or(BudgetRange { min: 0.0, max: 0.0 }),
                body.preferred_locations.unwrap_or_default(),
                body.property_types.unwrap_or_default(),
                body.investment_horizon.unwrap_or(InvestmentHorizon::Medium),
                body.risk_tolerance.unwrap_or(RiskLevel::Medium),
                body.preferred_return_type.unwrap_or(ReturnType::Both),
                body.additional_notes,
                now,
            ),
        };

    if budget.min < 0.0 || budget.max < 0.0 {
        return Err(crate::AppError::BadRequest(
            "budget range must be non-negative".into(),
        ));
    }

    sqlx::query(
        "INSERT INTO investor_profiles
         (user_id, investment_goals, budget_range, preferred_locations, property_types,
          investment_horizon, risk_tolerance, preferred_return_type, additional_notes,
          created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET
           investment_goals = excluded.investment_goals,
           budget_range = excluded.budget_range,
           preferred_locations = excluded.preferred_locations,
           property_types = excluded.property_types,
           investment_horizon = excluded.investment_horizon,
           risk_tolerance = excluded.risk_tolerance,
           preferred_return_type = excluded.preferred_return_type,
           additional_notes = excluded.additional_notes,
           updated_at = excluded.updated_at",
    )
    .bind(&user.id)
    .bind(Db(goals))
    .bind(Db(budget))
    .bind(Db(locations))
    .bind(Db(types))
    .bind(horizon)
    .bind(risk)
    .bind(return_type)
    .bind(&notes)
    .bind(created_at)
    .bind(now)
    .execute(&db_pool)
    .await?;

    let profile = fetch(&db_pool, &user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("profile missing right after upsert"))?;

    Ok(Json(json!({ "success": true, "data": { "profile": profile } })).into_response())
}

#[debug_handler(state = AppState)]
async fn delete_profile(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Response> {
    sqlx::query("DELETE FROM investor_profiles WHERE user_id = ?")
        .bind(&user.id)
        .execute(&db_pool)
        .await?;

    Ok(Json(json!({ "success": true, "message": "profile deleted successfully" })).into_response())
}
