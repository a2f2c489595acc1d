//! PostgreSQL 事务管理模块

use clinic_errors::{AppError, AppResult};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

/// 事务隔离级别
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    /// 读已提交（PostgreSQL 默认）
    #[default]
    ReadCommitted,
    /// 可重复读
    RepeatableRead,
    /// 可串行化
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// 事务访问模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl AccessMode {
    pub fn as_sql(&self) -> &'static str {
        match self {
            AccessMode::ReadWrite => "READ WRITE",
            AccessMode::ReadOnly => "READ ONLY",
        }
    }
}

/// 事务选项
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionOptions {
    pub isolation_level: IsolationLevel,
    pub access_mode: AccessMode,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.access_mode = AccessMode::ReadOnly;
        self
    }

    /// 生成 SET TRANSACTION 语句
    pub fn to_sql(&self) -> String {
        format!(
            "SET TRANSACTION ISOLATION LEVEL {}, {}",
            self.isolation_level.as_sql(),
            self.access_mode.as_sql()
        )
    }
}

/// 开始带选项的事务
pub async fn begin_with_options(
    pool: &PgPool,
    options: &TransactionOptions,
) -> AppResult<Transaction<'static, Postgres>> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database(format!("Failed to begin transaction: {}", e)))?;

    sqlx::query(&options.to_sql())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to set transaction options: {}", e)))?;

    debug!(
        isolation = options.isolation_level.as_sql(),
        access = options.access_mode.as_sql(),
        "Transaction started"
    );
    Ok(tx)
}

/// 获取事务级 advisory lock，提交或回滚时自动释放
///
/// 同一 key 的事务在此串行化。
pub async fn advisory_xact_lock(tx: &mut Transaction<'static, Postgres>, key: &str) -> AppResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(key)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to acquire advisory lock: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level() {
        assert_eq!(IsolationLevel::ReadCommitted.as_sql(), "READ COMMITTED");
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
    }

    #[test]
    fn test_transaction_options_sql() {
        let sql = TransactionOptions::new().read_only().to_sql();
        assert_eq!(sql, "SET TRANSACTION ISOLATION LEVEL READ COMMITTED, READ ONLY");

        let sql = TransactionOptions::new()
            .with_isolation_level(IsolationLevel::RepeatableRead)
            .to_sql();
        assert!(sql.contains("REPEATABLE READ"));
        assert!(sql.contains("READ WRITE"));
    }
}
