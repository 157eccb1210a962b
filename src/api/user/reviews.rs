use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::error::{ApiError, ValidatedJson};
use crate::middleware::auth::Claims;
use crate::services::catalog::{self, NewReview};

pub fn review_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/products/:id/reviews", post(add_review))
        .layer(Extension(db))
}

async fn add_review(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(payload): ValidatedJson<NewReview>,
) -> Result<impl IntoResponse, ApiError> {
    let review = catalog::add_review(&db, claims.user_id, id, payload).await?;
    Ok((StatusCode::CREATED, Json(review)))
}
