use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::auth::Claims;
use crate::services::accounts;

pub fn admin_users_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/users", get(get_users))
        .route("/users/:id", delete(delete_user))
        .layer(Extension(db))
}

async fn get_users(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(accounts::list_users(&db).await?))
}

async fn delete_user(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    accounts::delete_user(&db, claims.user_id, id).await?;
    Ok(Json(json!({
        "message": "User removed"
    })))
}
