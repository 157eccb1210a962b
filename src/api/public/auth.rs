use axum::{extract::Extension, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::error::{ApiError, ValidatedJson};
use crate::middleware::auth::TokenSettings;
use crate::services::accounts::{self, Credentials, Registration};

pub fn auth_router(db: Arc<DatabaseConnection>, tokens: Arc<TokenSettings>) -> Router {
    Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login))
        .layer(Extension(db))
        .layer(Extension(tokens))
}

async fn register_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(tokens): Extension<Arc<TokenSettings>>,
    ValidatedJson(payload): ValidatedJson<Registration>,
) -> Result<impl IntoResponse, ApiError> {
    let session = accounts::register(&db, &tokens, payload).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(tokens): Extension<Arc<TokenSettings>>,
    ValidatedJson(payload): ValidatedJson<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let session = accounts::login(&db, &tokens, payload).await?;
    Ok(Json(session))
}
