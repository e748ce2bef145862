use std::sync::Arc;

use istithmar::{app, auth::jwt, config::Config, db, AppState};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::broadcast;

const JWT_SECRET: &str = "integration-test-secret";

async fn spawn_app() -> (String, sqlx::SqlitePool) {
    let config = Arc::new(Config {
        port: 0,
        database_url: "sqlite::memory:".to_owned(),
        jwt_secret: JWT_SECRET.to_owned(),
        jwt_expiry_hours: 1,
        frontend_url: "http://localhost:3000".to_owned(),
    });

    // a single connection keeps every query on the same in-memory database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init(&db_pool).await.unwrap();

    let state = AppState {
        db_pool: db_pool.clone(),
        config,
        events: broadcast::channel(64).0,
    };
    let router = app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{addr}"), db_pool)
}

async fn register(base: &str, client: &reqwest::Client, email: &str, name: &str) -> Value {
    let res = client
        .post(format!("{base}/api/auth/register"))
        .json(&json!({ "email": email, "password": "password123", "name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    res.json().await.unwrap()
}

fn token(body: &Value) -> String {
    body["data"]["token"].as_str().unwrap().to_owned()
}

fn user_id(body: &Value) -> String {
    body["data"]["user"]["id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let (base, db_pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&base, &client, "sami@example.com", "Sami").await;

    let res = client
        .post(format!("{base}/api/auth/register"))
        .json(&json!({
            "email": "sami@example.com",
            "password": "password123",
            "name": "Sami Again",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind("sami@example.com")
        .fetch_one(&db_pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn login_token_decodes_to_the_same_user() {
    let (base, _db_pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let registered = register(&base, &client, "dina@example.com", "Dina").await;
    let id = user_id(&registered);

    let res = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({ "email": "dina@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();

    let claims = jwt::verify(&token(&body), JWT_SECRET).unwrap();
    assert_eq!(claims.sub, id);
    assert_eq!(claims.email, "dina@example.com");
    assert_eq!(serde_json::to_value(claims.role).unwrap(), "investor");
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let (base, _db_pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&base, &client, "omar@example.com", "Omar").await;

    let res = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({ "email": "omar@example.com", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn generate_recommendations_for_anchor_profile() {
    let (base, _db_pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let registered = register(&base, &client, "lina@example.com", "Lina").await;
    let auth = token(&registered);

    let res = client
        .put(format!("{base}/api/profile"))
        .bearer_auth(&auth)
        .json(&json!({
            "budgetRange": { "min": 100000, "max": 200000 },
            "preferredLocations": ["Ramallah"],
            "propertyTypes": ["residential"],
            "riskTolerance": "low",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .post(format!("{base}/api/recommendations/generate"))
        .bearer_auth(&auth)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();

    let recommendations = body["data"]["recommendations"].as_array().unwrap();
    assert!(!recommendations.is_empty());

    let apartment = recommendations
        .iter()
        .find(|r| r["propertyTitle"] == "Modern Apartment in Ramallah")
        .expect("anchor property should qualify");
    // 40 budget + 20 location + 20 type + 10 risk + 10 return
    assert_eq!(apartment["matchScore"], 100);
    assert!(!apartment["reasons"].as_array().unwrap().is_empty());

    for r in recommendations {
        assert!(r["matchScore"].as_i64().unwrap() >= 30);
    }

    // regeneration must not duplicate rows
    let res = client
        .post(format!("{base}/api/recommendations/generate"))
        .bearer_auth(&auth)
        .send()
        .await
        .unwrap();
    let again: Value = res.json().await.unwrap();
    assert_eq!(
        again["data"]["recommendations"].as_array().unwrap().len(),
        recommendations.len()
    );
}

#[tokio::test]
async fn deactivated_accounts_are_locked_out() {
    let (base, db_pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let registered = register(&base, &client, "faris@example.com", "Faris").await;
    let old_token = token(&registered);

    sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
        .bind(user_id(&registered))
        .execute(&db_pool)
        .await
        .unwrap();

    // a fresh login is refused
    let res = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({ "email": "faris@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    // and so is a token issued before the deactivation
    let res = client
        .get(format!("{base}/api/profile"))
        .bearer_auth(&old_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
}

#[tokio::test]
async fn forgot_password_does_not_reveal_accounts() {
    let (base, _db_pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&base, &client, "khalid@example.com", "Khalid").await;

    let mut bodies = Vec::new();
    for email in ["khalid@example.com", "nobody@example.com"] {
        let res = client
            .post(format!("{base}/api/auth/forgot-password"))
            .json(&json!({ "email": email }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        bodies.push(res.json::<Value>().await.unwrap());
    }
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn updating_recommendation_status_refreshes_the_row() {
    let (base, _db_pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let registered = register(&base, &client, "salma@example.com", "Salma").await;
    let auth = token(&registered);

    let res = client
        .put(format!("{base}/api/profile"))
        .bearer_auth(&auth)
        .json(&json!({
            "budgetRange": { "min": 100000, "max": 200000 },
            "preferredLocations": ["Ramallah"],
            "propertyTypes": ["residential"],
            "riskTolerance": "low",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .post(format!("{base}/api/recommendations/generate"))
        .bearer_auth(&auth)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    let id = body["data"]["recommendations"][0]["id"]
        .as_str()
        .unwrap()
        .to_owned();

    let res = client
        .put(format!("{base}/api/recommendations/{id}"))
        .bearer_auth(&auth)
        .json(&json!({ "status": "interested" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    let recommendation = &body["data"]["recommendation"];

    assert_eq!(recommendation["status"], "interested");
    // the response reflects the stored row, including the new timestamp
    assert_ne!(recommendation["updatedAt"], recommendation["createdAt"]);
}

#[tokio::test]
async fn recommendations_require_a_profile() {
    let (base, _db_pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let registered = register(&base, &client, "noprofile@example.com", "Nadia").await;

    let res = client
        .post(format!("{base}/api/recommendations/generate"))
        .bearer_auth(token(&registered))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn conversation_messages_and_archive_permissions() {
    let (base, _db_pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let investor = register(&base, &client, "investor@example.com", "Iyad").await;
    let advisor = register(&base, &client, "advisor@example.com", "Amal").await;
    let outsider = register(&base, &client, "outsider@example.com", "Osama").await;

    let res = client
        .post(format!("{base}/api/conversations"))
        .bearer_auth(token(&investor))
        .json(&json!({ "participantId": user_id(&advisor) }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    let conversation_id = body["data"]["conversation"]["id"].as_str().unwrap().to_owned();

    // appending a message updates the denormalized last-message fields
    let res = client
        .post(format!("{base}/api/conversations/{conversation_id}/messages"))
        .bearer_auth(token(&investor))
        .json(&json!({ "content": "hello, I am interested in Ramallah" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    let conversation = &body["data"]["conversation"];
    assert_eq!(conversation["messages"].as_array().unwrap().len(), 1);
    assert_eq!(
        conversation["lastMessage"],
        "hello, I am interested in Ramallah"
    );
    assert!(conversation["lastMessageAt"].is_string());

    // a non-participant can neither post nor archive
    let res = client
        .post(format!("{base}/api/conversations/{conversation_id}/messages"))
        .bearer_auth(token(&outsider))
        .json(&json!({ "content": "let me in" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    let res = client
        .put(format!("{base}/api/conversations/{conversation_id}/archive"))
        .bearer_auth(token(&outsider))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    // status is untouched after the rejected archive
    let res = client
        .get(format!("{base}/api/conversations/{conversation_id}"))
        .bearer_auth(token(&advisor))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["conversation"]["status"], "active");

    // and a participant can archive
    let res = client
        .put(format!("{base}/api/conversations/{conversation_id}/archive"))
        .bearer_auth(token(&advisor))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn admin_routes_are_gated_by_role() {
    let (base, db_pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let investor = register(&base, &client, "plain@example.com", "Rami").await;

    let res = client
        .get(format!("{base}/api/admin/stats"))
        .bearer_auth(token(&investor))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    // promote and retry with a fresh token
    sqlx::query("UPDATE users SET role = 'admin' WHERE id = ?")
        .bind(user_id(&investor))
        .execute(&db_pool)
        .await
        .unwrap();

    let res = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({ "email": "plain@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();

    let res = client
        .get(format!("{base}/api/admin/stats"))
        .bearer_auth(token(&body))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let stats: Value = res.json().await.unwrap();
    assert_eq!(stats["data"]["stats"]["totalUsers"], 1);
}

#[tokio::test]
async fn content_view_counter_increments() {
    let (base, db_pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let author = register(&base, &client, "author@example.com", "Huda").await;
    sqlx::query("UPDATE users SET role = 'advisor' WHERE id = ?")
        .bind(user_id(&author))
        .execute(&db_pool)
        .await
        .unwrap();

    let res = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({ "email": "author@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap();
    let author: Value = res.json().await.unwrap();

    let res = client
        .post(format!("{base}/api/content"))
        .bearer_auth(token(&author))
        .json(&json!({
            "title": "Investing in West Bank real estate",
            "description": "A starter guide",
            "type": "guide",
            "category": "basics",
            "content": "Start with a budget...",
            "status": "published",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    let content_id = body["data"]["content"]["id"].as_str().unwrap().to_owned();

    for expected in 1..=2 {
        let res = client
            .get(format!("{base}/api/content/{content_id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["data"]["content"]["views"], expected);
    }
}

#[tokio::test]
async fn author_can_change_the_content_type() {
    let (base, db_pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let author = register(&base, &client, "writer@example.com", "Widad").await;
    sqlx::query("UPDATE users SET role = 'advisor' WHERE id = ?")
        .bind(user_id(&author))
        .execute(&db_pool)
        .await
        .unwrap();

    let res = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({ "email": "writer@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap();
    let author: Value = res.json().await.unwrap();

    let res = client
        .post(format!("{base}/api/content"))
        .bearer_auth(token(&author))
        .json(&json!({
            "title": "Quarterly market overview",
            "description": "Trends across the major cities",
            "type": "guide",
            "category": "market",
            "content": "Prices held steady...",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    let content_id = body["data"]["content"]["id"].as_str().unwrap().to_owned();

    let res = client
        .put(format!("{base}/api/content/{content_id}"))
        .bearer_auth(token(&author))
        .json(&json!({ "type": "market-report" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["content"]["type"], "market-report");
}

#[tokio::test]
async fn profile_requires_authentication() {
    let (base, _db_pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{base}/api/profile"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(format!("{base}/api/profile"))
        .bearer_auth("invalid.token.here")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
}
