use crate::entities::user::{Entity as UserEntity, Role};
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Resolves the bearer token to a live user and inserts its [`Claims`] into
/// the request extensions. `role` is the minimum role the router requires:
/// `Role::User` admits every signed-in account, `Role::Admin` only admins.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, no token".into()))?;

    let claims = validate_token(&state.db, &state.tokens, token)
        .await
        .map_err(|err| match err {
            AuthMiddlewareError::Store(db_err) => ApiError::Store(db_err),
            other => {
                debug!(reason = %other, "Rejected bearer token");
                ApiError::Unauthorized("Not authorized, token failed".into())
            }
        })?;

    if state.role == Role::Admin && claims.role != Role::Admin {
        return Err(ApiError::Forbidden("Not authorized as an admin".into()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Clone, Debug)]
pub struct TokenSettings {
    pub secret: String,
    pub ttl_hours: i64,
}

#[derive(Clone, Debug)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub tokens: Arc<TokenSettings>,
    pub role: Role,
}

pub fn generate_token(
    settings: &TokenSettings,
    user_id: i32,
    role: Role,
) -> Result<String, AuthMiddlewareError> {
    let exp = Duration::try_hours(settings.ttl_hours)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or(AuthMiddlewareError::GenerationFail)?
        .timestamp() as usize;

    let claims = Claims { user_id, role, exp };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.secret.as_bytes()),
    )
    .map_err(|_| AuthMiddlewareError::GenerationFail)
}

/// Decodes the token and re-reads the user, so the role in the returned
/// claims is the stored one rather than whatever was signed at login.
pub async fn validate_token(
    db: &DatabaseConnection,
    settings: &TokenSettings,
    token: &str,
) -> Result<Claims, AuthMiddlewareError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AuthMiddlewareError::ValidationFail)?;

    let mut claims = token_data.claims;

    let user = UserEntity::find_by_id(claims.user_id)
        .one(db)
        .await?
        .ok_or(AuthMiddlewareError::InvalidUserOrRole)?;

    claims.role = user.role;
    Ok(claims)
}

#[derive(Error, Debug)]
pub enum AuthMiddlewareError {
    #[error("Invalid user id or role")]
    InvalidUserOrRole,
    #[error("Failed to validate token")]
    ValidationFail,
    #[error("Failed to generate token")]
    GenerationFail,
    #[error("Store failure: {0}")]
    Store(#[from] sea_orm::DbErr),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_user, memory_db};

    fn settings() -> TokenSettings {
        TokenSettings {
            secret: "unit-test-secret".into(),
            ttl_hours: 1,
        }
    }

    #[tokio::test]
    async fn token_round_trips_to_live_user() {
        let db = memory_db().await;
        let user = insert_user(&db, "alice").await;

        let token = generate_token(&settings(), user.id, Role::User).unwrap();
        let claims = validate_token(&db, &settings(), &token).await.unwrap();

        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.role, Role::User);
    }

    #[tokio::test]
    async fn signed_role_is_not_trusted() {
        let db = memory_db().await;
        let user = insert_user(&db, "mallory").await;

        let token = generate_token(&settings(), user.id, Role::Admin).unwrap();
        let claims = validate_token(&db, &settings(), &token).await.unwrap();

        assert_eq!(claims.role, Role::User);
    }

    #[tokio::test]
    async fn rejects_foreign_signature_and_unknown_user() {
        let db = memory_db().await;
        let user = insert_user(&db, "bob").await;

        let other = TokenSettings {
            secret: "someone-else".into(),
            ttl_hours: 1,
        };
        let forged = generate_token(&other, user.id, Role::User).unwrap();
        assert!(matches!(
            validate_token(&db, &settings(), &forged).await,
            Err(AuthMiddlewareError::ValidationFail)
        ));

        let ghost = generate_token(&settings(), 9_999, Role::User).unwrap();
        assert!(matches!(
            validate_token(&db, &settings(), &ghost).await,
            Err(AuthMiddlewareError::InvalidUserOrRole)
        ));
    }

    #[test]
    fn unrepresentable_lifetime_fails_instead_of_panicking() {
        let settings = TokenSettings {
            secret: "unit-test-secret".into(),
            ttl_hours: i64::MAX,
        };
        assert!(matches!(
            generate_token(&settings, 1, Role::User),
            Err(AuthMiddlewareError::GenerationFail)
        ));
    }
}
