// db/db.rs
use redis::aio::ConnectionManager;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
    pub redis_client: Option<Arc<ConnectionManager>>,
}

impl std::fmt::Debug for DBClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBClient")
            .field("pool", &"Pool<Postgres>")
            .field("redis_client", &self.redis_client.is_some())
            .finish()
    }
}

impl DBClient {
    /// Create a new DBClient with PostgreSQL pool only
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient {
            pool,
            redis_client: None,
        }
    }

    /// Create a new DBClient with both PostgreSQL and Redis.
    /// A Redis failure is not fatal: the client falls back to running without it.
    pub async fn with_redis(pool: Pool<Postgres>, redis_url: &str) -> Self {
        DBClient {
            pool,
            redis_client: connect_redis(redis_url).await.map(Arc::new),
        }
    }

    /// Get cache status for monitoring
    pub fn cache_status(&self) -> &str {
        if self.redis_client.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    }
}

/// Opens a Redis connection manager, logging and returning `None` on failure.
pub async fn connect_redis(redis_url: &str) -> Option<ConnectionManager> {
    match redis::Client::open(redis_url) {
        Ok(client) => match ConnectionManager::new(client).await {
            Ok(conn) => {
                tracing::info!("Redis connection established successfully");
                Some(conn)
            }
            Err(e) => {
                tracing::warn!("Failed to connect to Redis: {}. Continuing without shared cache.", e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to create Redis client: {}. Continuing without shared cache.", e);
            None
        }
    }
}
