pub mod jwt;
pub mod password;

mod handlers;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
    routing::{get, post, put},
    Router,
};

use crate::{
    models::{Role, User},
    AppError, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/forgot-password", post(handlers::forgot_password))
        .route("/me", get(handlers::me))
        .route("/password", put(handlers::update_password))
        .route("/logout", post(handlers::logout))
}

/// Bearer-token guard. Verifies the JWT, loads the user row and rejects
/// inactive accounts, so handlers only ever see a live caller.
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("not authorized, no token provided".into()))?;

        let claims = jwt::verify(token, &state.config.jwt_secret)
            .map_err(|_| AppError::Unauthorized("not authorized, invalid token".into()))?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(&claims.sub)
            .fetch_optional(&state.db_pool)
            .await?
            .ok_or_else(|| AppError::Unauthorized("not authorized, user not found".into()))?;

        if !user.is_active {
            return Err(AppError::Forbidden("account is inactive".into()));
        }

        Ok(AuthUser(user))
    }
}

/// `AuthUser` narrowed to the admin role.
pub struct Admin(pub User);

impl<S> FromRequestParts<S> for Admin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(AppError::Forbidden(
                "you do not have permission to perform this action".into(),
            ));
        }
        Ok(Admin(user))
    }
}

pub(crate) fn require_role(user: &User, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "you do not have permission to perform this action".into(),
        ))
    }
}
