use tracing::info;
use tracing_subscriber::EnvFilter;

use storefront::config::AppConfig;
use storefront::{create_app, init_database, StartupError};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storefront=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let db = init_database(&config).await?;
    let app = create_app(db, &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "Storefront listening");
    axum::serve(listener, app).await?;

    Ok(())
}
