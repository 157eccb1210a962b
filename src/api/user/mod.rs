pub mod cart;
pub mod orders;
pub mod profile;
pub mod reviews;

use axum::{middleware::from_fn_with_state, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::entities::user::Role;
use crate::middleware::auth::{auth_middleware, AuthState, TokenSettings};
use cart::cart_router;
use orders::order_router;
use profile::profile_router;
use reviews::review_router;

pub fn user_api_router(db: Arc<DatabaseConnection>, tokens: Arc<TokenSettings>) -> Router {
    Router::new()
        .merge(cart_router(db.clone()))
        .merge(order_router(db.clone()))
        .merge(profile_router(db.clone(), tokens.clone()))
        .merge(review_router(db.clone()))
        .route_layer(from_fn_with_state(
            AuthState {
                db,
                tokens,
                role: Role::User,
            },
            auth_middleware,
        ))
}
