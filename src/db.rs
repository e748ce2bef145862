use sqlx::SqlitePool;

/// Creates the schema on a fresh database. Uniqueness and range rules
/// live here: one profile/advisor/consent row per user, one
/// recommendation per user+title, two distinct conversation participants.
pub async fn init(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(db_pool).await?;
    Ok(())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    name TEXT NOT NULL,
    phone_number TEXT,
    role TEXT NOT NULL DEFAULT 'investor',
    is_active INTEGER NOT NULL DEFAULT 1,
    is_email_verified INTEGER NOT NULL DEFAULT 0,
    last_login TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS investor_profiles (
    user_id TEXT PRIMARY KEY REFERENCES users(id),
    investment_goals TEXT NOT NULL,
    budget_range TEXT NOT NULL,
    preferred_locations TEXT NOT NULL,
    property_types TEXT NOT NULL,
    investment_horizon TEXT NOT NULL DEFAULT 'medium',
    risk_tolerance TEXT NOT NULL DEFAULT 'medium',
    preferred_return_type TEXT NOT NULL DEFAULT 'both',
    additional_notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS advisors (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE REFERENCES users(id),
    specialization TEXT NOT NULL,
    experience INTEGER NOT NULL,
    certifications TEXT NOT NULL,
    languages TEXT NOT NULL,
    bio TEXT NOT NULL,
    availability TEXT NOT NULL,
    rating REAL NOT NULL DEFAULT 0 CHECK (rating >= 0 AND rating <= 5),
    review_count INTEGER NOT NULL DEFAULT 0,
    hourly_rate REAL,
    is_available INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS content (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    kind TEXT NOT NULL,
    category TEXT NOT NULL,
    body TEXT NOT NULL,
    author_id TEXT NOT NULL REFERENCES users(id),
    tags TEXT NOT NULL,
    image_url TEXT,
    video_url TEXT,
    is_premium INTEGER NOT NULL DEFAULT 0,
    views INTEGER NOT NULL DEFAULT 0,
    likes INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'draft',
    published_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS recommendations (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    property_title TEXT NOT NULL,
    property_description TEXT NOT NULL,
    location TEXT NOT NULL,
    property_type TEXT NOT NULL,
    price REAL NOT NULL CHECK (price >= 0),
    expected_return REAL NOT NULL,
    risk_level TEXT NOT NULL,
    match_score INTEGER NOT NULL CHECK (match_score >= 0 AND match_score <= 100),
    reasons TEXT NOT NULL,
    image_url TEXT,
    property_details TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (user_id, property_title)
);

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    participant_a TEXT NOT NULL REFERENCES users(id),
    participant_b TEXT NOT NULL REFERENCES users(id),
    last_message TEXT,
    last_message_at TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (participant_a <> participant_b)
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id),
    sender_id TEXT NOT NULL REFERENCES users(id),
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS consents (
    user_id TEXT PRIMARY KEY REFERENCES users(id),
    terms_of_service TEXT NOT NULL,
    privacy_policy TEXT NOT NULL,
    marketing_emails INTEGER NOT NULL DEFAULT 0,
    data_sharing INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages (conversation_id);
CREATE INDEX IF NOT EXISTS idx_recommendations_user ON recommendations (user_id);
CREATE INDEX IF NOT EXISTS idx_conversations_last_message_at ON conversations (last_message_at);
"#;
