use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::error::ApiError;
use crate::services::analytics;

pub fn analytics_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/analytics", get(get_dashboard))
        .layer(Extension(db))
}

async fn get_dashboard(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(analytics::dashboard(&db).await?))
}
