use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, put},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::{ApiError, ValidatedJson};
use crate::middleware::auth::Claims;
use crate::services::cart;

//ROUTERS
pub fn cart_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/cart", get(get_cart).post(add_product))
        .route("/cart/clear", delete(clear_cart))
        .route("/cart/:id", put(set_quantity).delete(remove_product))
        .layer(Extension(db))
}

//ROUTES
async fn get_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(cart::list(&db, claims.user_id).await?))
}

async fn add_product(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(payload): ValidatedJson<AddProduct>,
) -> Result<impl IntoResponse, ApiError> {
    let (line, created) = cart::add(&db, claims.user_id, payload.product_id, payload.quantity).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(line)))
}

async fn set_quantity(
    Path(id): Path<i32>,
    Extension(claims): Extension<Claims>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<SetQuantity>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        cart::set_quantity(&db, claims.user_id, id, payload.quantity).await?,
    ))
}

async fn remove_product(
    Path(id): Path<i32>,
    Extension(claims): Extension<Claims>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    cart::remove(&db, claims.user_id, id).await?;
    Ok(Json(json!({
        "message": "Item removed from cart"
    })))
}

async fn clear_cart(
    Extension(claims): Extension<Claims>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    cart::clear(db.as_ref(), claims.user_id).await?;
    Ok(Json(json!({
        "message": "Cart cleared"
    })))
}

//Structs
#[derive(Deserialize, Validate, Debug)]
#[serde(rename_all = "camelCase")]
struct AddProduct {
    #[serde(alias = "product")]
    product_id: i32,
    #[serde(default = "one")]
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    quantity: i32,
}

fn one() -> i32 {
    1
}

#[derive(Deserialize, Validate, Debug)]
struct SetQuantity {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    quantity: i32,
}
