// config.rs
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub port: u16,
    pub log_level: String,
    pub allowed_origins: Vec<String>,
    // Payment gateway
    pub gateway_signing_key: Option<String>,
    pub gateway_base_url: String,
    pub gateway_client_id: String,
    pub gateway_client_secret: String,
    pub gateway_account_id: String,
    pub gateway_timeout_secs: u64,
    // Reconciliation
    pub reconciliation_cache_ttl_secs: u64,
    pub gateway_balance_cache_ttl_secs: u64,
    pub reconciliation_interval_secs: u64,
    pub query_timeout_ms: u64,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");

        let redis_url = std::env::var("REDIS_URL").ok().filter(|url| !url.is_empty());

        // An empty signing key is treated the same as a missing one
        let gateway_signing_key = std::env::var("GATEWAY_SIGNING_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let gateway_base_url = std::env::var("GATEWAY_BASE_URL")
            .unwrap_or_else(|_| "https://api.gateway.example".to_string());
        let gateway_client_id = std::env::var("GATEWAY_CLIENT_ID").unwrap_or_default();
        let gateway_client_secret = std::env::var("GATEWAY_CLIENT_SECRET").unwrap_or_default();
        let gateway_account_id = std::env::var("GATEWAY_ACCOUNT_ID").unwrap_or_default();

        let allowed_origins: Vec<String> = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://localhost:8000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Config {
            database_url,
            redis_url,
            jwt_secret,
            port: env_or("PORT", 8000),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
            allowed_origins,
            gateway_signing_key,
            gateway_base_url: gateway_base_url.trim_end_matches('/').to_string(),
            gateway_client_id,
            gateway_client_secret,
            gateway_account_id,
            gateway_timeout_secs: env_or("GATEWAY_TIMEOUT_SECS", 10),
            reconciliation_cache_ttl_secs: env_or("RECONCILIATION_CACHE_TTL_SECS", 300),
            gateway_balance_cache_ttl_secs: env_or("GATEWAY_BALANCE_CACHE_TTL_SECS", 60),
            reconciliation_interval_secs: env_or("RECONCILIATION_INTERVAL_SECS", 0),
            query_timeout_ms: env_or("QUERY_TIMEOUT_MS", 5000),
        }
    }

    /// Whether `DATABASE_URL` selects the in-memory ledger instead of Postgres.
    pub fn uses_memory_ledger(&self) -> bool {
        self.database_url == "memory"
    }

    pub fn gateway_configured(&self) -> bool {
        !self.gateway_client_id.is_empty()
            && !self.gateway_client_secret.is_empty()
            && !self.gateway_account_id.is_empty()
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn reconciliation_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.reconciliation_cache_ttl_secs)
    }

    pub fn gateway_balance_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.gateway_balance_cache_ttl_secs)
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}
