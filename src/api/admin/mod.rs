pub mod analytics;
pub mod category;
pub mod product;
pub mod users;

use axum::{middleware::from_fn_with_state, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use analytics::analytics_router;
use category::admin_category_router;
use product::admin_product_router;
use users::admin_users_router;

use crate::entities::user::Role;
use crate::middleware::auth::{auth_middleware, AuthState, TokenSettings};

pub fn admin_api_router(db: Arc<DatabaseConnection>, tokens: Arc<TokenSettings>) -> Router {
    Router::new()
        .merge(admin_category_router(db.clone()))
        .merge(admin_product_router(db.clone()))
        .merge(admin_users_router(db.clone()))
        .merge(analytics_router(db.clone()))
        .route_layer(from_fn_with_state(
            AuthState {
                db,
                tokens,
                role: Role::Admin,
            },
            auth_middleware,
        ))
}
