//! PostgreSQL 连接管理

use std::time::Duration;

use clinic_common::{RetryConfig, with_retry};
use clinic_config::DatabaseConfig;
use clinic_errors::{AppError, AppResult};
use secrecy::ExposeSecret;
use sqlx::Executor;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// PostgreSQL 连接池配置
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    /// 每个连接的 statement_timeout，None 表示使用服务器默认值
    pub statement_timeout: Option<Duration>,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            statement_timeout: None,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }
}

impl From<&DatabaseConfig> for PostgresConfig {
    fn from(config: &DatabaseConfig) -> Self {
        let mut pg = PostgresConfig::new(config.url.expose_secret().as_str())
            .with_max_connections(config.max_connections);
        pg.acquire_timeout = Duration::from_secs(config.acquire_timeout_secs);
        if config.statement_timeout_ms > 0 {
            pg = pg.with_statement_timeout(Duration::from_millis(config.statement_timeout_ms));
        }
        pg
    }
}

/// 创建 PostgreSQL 连接池
pub async fn create_pool(config: &PostgresConfig) -> AppResult<PgPool> {
    let statement_timeout = config.statement_timeout.map(|t| t.as_millis() as u64);

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                if let Some(ms) = statement_timeout {
                    conn.execute(format!("SET statement_timeout = {}", ms).as_str())
                        .await?;
                }
                Ok(())
            })
        })
        .connect(&config.url)
        .await
        .map_err(|e| AppError::database(format!("Failed to create pool: {}", e)))
}

/// 创建连接池，瞬时故障时按退避策略重试
pub async fn connect_with_retry(config: &PostgresConfig, retry: &RetryConfig) -> AppResult<PgPool> {
    let pool = with_retry(retry, "PostgreSQL connection", || create_pool(config)).await?;
    info!(
        max_connections = config.max_connections,
        "PostgreSQL connection pool created"
    );
    Ok(pool)
}

/// 检查数据库连接
pub async fn check_connection(pool: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| AppError::database(format!("Database health check failed: {}", e)))?;
    Ok(())
}
