use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::entities::order::Status;
use crate::error::{ApiError, ValidatedJson};
use crate::middleware::auth::Claims;
use crate::services::orders::{self, Address, LineItemInput, NewOrder};

//ROUTERS
/// Admin-only operations share paths with the owner routes, so they are
/// served here and check the caller's role themselves.
pub fn order_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/orders", post(create_order).get(admin_list_orders))
        .route("/orders/my", get(my_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", put(cancel_order))
        .route("/orders/:id/status", put(admin_set_status))
        .layer(Extension(db))
}

//ROUTES
async fn create_order(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(payload): ValidatedJson<CreateOrder>,
) -> Result<impl IntoResponse, ApiError> {
    let order = orders::create(&db, claims.user_id, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn my_orders(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(orders::list_for_owner(&db, claims.user_id).await?))
}

async fn get_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(orders::get(&db, id, &claims).await?))
}

async fn cancel_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(orders::cancel(&db, id, &claims).await?))
}

async fn admin_list_orders(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;
    Ok(Json(orders::list_all(&db).await?))
}

async fn admin_set_status(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(payload): ValidatedJson<SetStatus>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;
    Ok(Json(orders::set_status(&db, id, payload.status).await?))
}

fn require_admin(claims: &Claims) -> Result<(), ApiError> {
    if claims.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not authorized as an admin".into()))
    }
}

//Structs
#[derive(Deserialize, Validate, Debug)]
#[serde(rename_all = "camelCase")]
struct CreateOrder {
    #[serde(default, alias = "orderItems", alias = "lineItems")]
    #[validate(nested)]
    products: Vec<LineItemInput>,
    total_price: f64,
    #[serde(alias = "shippingAddress")]
    #[validate(nested)]
    address: Address,
    payment_method: Option<String>,
}

impl From<CreateOrder> for NewOrder {
    fn from(value: CreateOrder) -> Self {
        NewOrder {
            line_items: value.products,
            total_price: value.total_price,
            address: value.address,
            payment_method: value.payment_method,
        }
    }
}

#[derive(Deserialize, Validate, Debug)]
struct SetStatus {
    status: Status,
}
