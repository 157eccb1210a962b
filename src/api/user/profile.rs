use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::error::{ApiError, ValidatedJson};
use crate::middleware::auth::{Claims, TokenSettings};
use crate::services::accounts::{self, ProfileUpdate};

pub fn profile_router(db: Arc<DatabaseConnection>, tokens: Arc<TokenSettings>) -> Router {
    Router::new()
        .route("/auth/profile", get(get_profile).put(update_profile))
        .layer(Extension(db))
        .layer(Extension(tokens))
}

async fn get_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(accounts::profile(&db, claims.user_id).await?))
}

async fn update_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(tokens): Extension<Arc<TokenSettings>>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(payload): ValidatedJson<ProfileUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        accounts::update_profile(&db, &tokens, claims.user_id, payload).await?,
    ))
}
