use std::sync::Arc;

use anyhow::Context;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use ledgerhook::{
    config::Config,
    db::{
        cache::{CacheStore, MemoryCache, RedisCache},
        db::{connect_redis, DBClient},
        memory::MemoryLedger,
        LedgerExt,
    },
    routes::create_router,
    service::{background_jobs::start_reconciliation_job, gateway::GatewayClient},
    AppState,
};

const CACHE_NAMESPACE: &str = "ledgerhook";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::init();

    let level = config
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::DEBUG);
    tracing_subscriber::fmt().with_max_level(level).init();

    let (db_client, redis_conn) = if config.uses_memory_ledger() {
        tracing::warn!("DATABASE_URL=memory: using the in-memory ledger, data is lost on restart");
        let redis_conn = match &config.redis_url {
            Some(url) => connect_redis(url).await,
            None => None,
        };
        let ledger: Arc<dyn LedgerExt> = Arc::new(MemoryLedger::new());
        (ledger, redis_conn)
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(5)
            .connect(&config.database_url)
            .await
            .context("failed to connect to the database")?;
        tracing::info!("Connection to the database is successful");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        let db_client = match &config.redis_url {
            Some(url) => DBClient::with_redis(pool, url).await,
            None => {
                tracing::info!("Redis not configured, using the in-process cache (set REDIS_URL to share it)");
                DBClient::new(pool)
            }
        };
        tracing::info!("Cache status: {}", db_client.cache_status());

        let redis_conn = db_client.redis_client.as_ref().map(|conn| (**conn).clone());
        let ledger: Arc<dyn LedgerExt> = Arc::new(db_client);
        (ledger, redis_conn)
    };

    let cache: Arc<dyn CacheStore> = match redis_conn {
        Some(conn) => Arc::new(RedisCache::new(conn, CACHE_NAMESPACE)),
        None => Arc::new(MemoryCache::new()),
    };

    if config.gateway_signing_key.is_none() {
        tracing::warn!("GATEWAY_SIGNING_KEY is not set; every webhook will be rejected with 500");
    }
    if !config.gateway_configured() {
        tracing::warn!("Gateway credentials are not set; reconciliation will use a gateway balance of 0");
    }

    let gateway = Arc::new(GatewayClient::from_config(&config).context("failed to build gateway client")?);

    let app_state = Arc::new(AppState::new(config.clone(), db_client, cache, gateway));

    if config.reconciliation_interval_secs > 0 {
        let every = std::time::Duration::from_secs(config.reconciliation_interval_secs);
        tokio::spawn(start_reconciliation_job(app_state.clone(), every));
        tracing::info!("Periodic reconciliation every {:?}", every);
    }

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE]);

    let app = create_router(app_state.clone()).layer(cors);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;

    tracing::info!(
        "Server is running on http://localhost:{} (cache: {})",
        config.port,
        app_state.cache.backend()
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
