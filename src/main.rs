use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use court_booking::{
    app,
    cache::CacheService,
    config::Config,
    services::{
        identity::FirebaseVerifier,
        payment::{CircuitBreaker, StripeClient},
    },
    store::{MemoryStore, PgStore, Store},
    AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting court booking server");

    // Storage
    let store: Arc<dyn Store> = match &config.database.url {
        Some(url) => {
            let db = PgStore::connect(url, config.database.pool_size)
                .await
                .context("failed to connect to database")?;
            db.run_migrations().await.context("failed to run migrations")?;
            info!("Database connected");
            Arc::new(db)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::default())
        }
    };

    // External collaborators
    let identity = FirebaseVerifier::from_config(&config.identity)?;
    let payments = StripeClient::new(
        &config.payment,
        CircuitBreaker::from_config(&config.circuit_breaker),
    )?;

    let mut state = AppState::new(store, Arc::new(identity), Arc::new(payments));

    // Optional cache
    if let Some(url) = &config.redis.url {
        match CacheService::connect(url).await {
            Ok(cache) => {
                info!("Redis connected");
                state = state.with_cache(cache);
            }
            Err(e) => warn!("Redis unavailable, caching disabled: {:?}", e),
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("HOST/PORT do not form a socket address")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(Arc::new(state))).await?;
    Ok(())
}
