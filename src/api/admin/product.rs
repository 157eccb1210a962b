use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;

use crate::error::{ApiError, ValidatedJson};
use crate::services::catalog::{self, NewProduct, ProductUpdate};

//ROUTERS
pub fn admin_product_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
        .layer(Extension(db))
}

//ROUTES
async fn create_product(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<NewProduct>,
) -> Result<impl IntoResponse, ApiError> {
    let product = catalog::create_product(&db, payload).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<ProductUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(catalog::update_product(&db, id, payload).await?))
}

async fn delete_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    catalog::delete_product(&db, id).await?;
    Ok(Json(json!({
        "message": "Product removed"
    })))
}
