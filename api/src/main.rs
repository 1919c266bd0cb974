use hive_api::{cors_layer, db, router, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let pool = db::open(&config.database_url)?;
    db::run_migrations(&pool)?;
    tracing::info!(database = %config.database_url, "database ready");

    let cors = cors_layer(&config.cors_origin)?;
    let addr = config.bind_addr.clone();
    let app = router(AppState::new(pool, config)).layer(cors);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API server listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
