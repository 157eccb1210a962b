pub mod admin;
pub mod public;
pub mod user;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::middleware::auth::TokenSettings;
use admin::admin_api_router;
use public::public_api_router;
use user::user_api_router;

pub fn create_api_router(shared_db: Arc<DatabaseConnection>, tokens: Arc<TokenSettings>) -> Router {
    let storefront = public_api_router(shared_db.clone(), tokens.clone())
        .merge(user_api_router(shared_db.clone(), tokens.clone()));

    Router::new()
        .nest("/api", storefront)
        .nest("/api/admin", admin_api_router(shared_db, tokens))
}
