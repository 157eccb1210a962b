pub mod api;
pub mod config;
pub mod entities;
pub mod error;
pub mod middleware;
pub mod services;

use axum::Router;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::api::create_api_router;
use crate::config::{AppConfig, ConfigError};
use crate::entities::{primary_setup, setup_schema};
use crate::middleware::auth::TokenSettings;
use crate::middleware::logging::logging_middleware;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Failed to seed initial data: {0}")]
    Seed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connects, creates the schema and seeds the initial accounts.
pub async fn init_database(config: &AppConfig) -> Result<DatabaseConnection, StartupError> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.db_max_connections)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(false);
    if config.is_in_memory() {
        // Every pooled connection would otherwise open its own empty database.
        options.max_connections(1).min_connections(1);
    }

    let db = Database::connect(options).await?;
    setup_schema(&db).await?;
    primary_setup(&db, config).await?;
    Ok(db)
}

pub fn create_app(db: DatabaseConnection, config: &AppConfig) -> Router {
    let tokens = TokenSettings {
        secret: config.jwt_secret.clone(),
        ttl_hours: config.token_ttl_hours,
    };

    create_api_router(Arc::new(db), Arc::new(tokens))
        .layer(axum::middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod test_support {
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
    use std::{path::PathBuf, sync::Arc};

    use crate::config::AppConfig;
    use crate::entities::{product, user};

    pub fn memory_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            jwt_secret: "unit-test-secret".into(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            token_ttl_hours: 1,
            db_max_connections: 1,
            admin_email: "admin@grocery.com".into(),
            admin_password: "admin123".into(),
            seed_demo_data: false,
        }
    }

    pub async fn memory_db() -> DatabaseConnection {
        crate::init_database(&memory_config()).await.unwrap()
    }

    /// File-backed database with a pool of several connections, so writers
    /// really contend for the lock. The files are removed on drop.
    pub struct FileDb {
        pub db: Arc<DatabaseConnection>,
        path: PathBuf,
    }

    impl Drop for FileDb {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm", "-journal"] {
                let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
            }
        }
    }

    pub async fn file_db() -> FileDb {
        let path = std::env::temp_dir().join(format!("storefront-{}.db", uuid::Uuid::new_v4()));
        let mut config = memory_config();
        config.database_url = format!("sqlite://{}?mode=rwc", path.display());
        config.db_max_connections = 5;
        let db = crate::init_database(&config).await.unwrap();
        FileDb {
            db: Arc::new(db),
            path,
        }
    }

    pub async fn insert_user(db: &DatabaseConnection, username: &str) -> user::Model {
        user::ActiveModel {
            firstname: Set("Test".into()),
            lastname: Set("User".into()),
            username: Set(username.into()),
            email: Set(format!("{username}@example.com")),
            password: Set("not-a-hash".into()),
            role: Set(user::Role::User),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn insert_product(db: &DatabaseConnection, name: &str, price: f64) -> product::Model {
        product::ActiveModel {
            name: Set(name.into()),
            description: Set(String::new()),
            price: Set(price),
            image: Set(format!("/img/{name}.jpg")),
            category_id: Set(None),
            count_in_stock: Set(10),
            rating: Set(0.0),
            num_reviews: Set(0),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }
}
