use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::{Role, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user: &User, expiry_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(expiry_hours)).timestamp(),
        }
    }
}

pub fn sign(user: &User, secret: &str, expiry_hours: i64) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        &Claims::new(user, expiry_hours),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-testing-purposes-only";

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: "0194e7a2-0000-7000-8000-000000000001".to_owned(),
            email: "sami@example.com".to_owned(),
            password_hash: String::new(),
            name: "Sami".to_owned(),
            phone_number: None,
            role: Role::Investor,
            is_active: true,
            is_email_verified: false,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let user = test_user();
        let token = sign(&user, SECRET, 1).unwrap();
        assert!(!token.is_empty());

        let claims = verify(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, Role::Investor);
    }

    #[test]
    fn rejects_garbage_token() {
        assert!(verify("invalid.token.here", SECRET).is_err());
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = sign(&test_user(), SECRET, 1).unwrap();
        assert!(verify(&token, "some-other-secret").is_err());
    }
}
