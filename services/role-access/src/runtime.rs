//! 服务装配
//!
//! 进程内共享的服务对象，由 CLI 或宿主程序在启动时创建一次。

use std::sync::Arc;

use clinic_adapter_postgres::{PostgresConfig, connect_with_retry};
use clinic_common::RetryConfig;
use clinic_errors::{AppError, AppResult};
use clinic_ports::AuditSink;
use sqlx::PgPool;
use tracing::info;

use crate::application::{
    CatalogCommandHandler, CatalogQueryHandler, PermissionResolver, RoleAssignmentService,
};
use crate::config::{AccessConfig, AuditMode, ServiceConfig};
use crate::domain::unit_of_work::UnitOfWorkFactory;
use crate::infrastructure::persistence::PostgresUnitOfWorkFactory;
use crate::infrastructure::{NoOpAuditSink, TracingAuditSink};

/// 内嵌的数据库迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// 执行数据库迁移
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| AppError::database(format!("Migration failed: {}", e)))?;
    info!("Database migrations applied");
    Ok(())
}

/// 服务对象集合
pub struct AccessServices {
    pub assignments: RoleAssignmentService,
    pub permissions: PermissionResolver,
    pub catalog: CatalogCommandHandler,
    pub catalog_queries: CatalogQueryHandler,
}

impl AccessServices {
    /// 按 `[access]` 配置装配，审计方式由 `audit` 决定
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>, config: &AccessConfig) -> Self {
        let sink: Arc<dyn AuditSink> = match config.audit {
            AuditMode::Tracing => Arc::new(TracingAuditSink),
            AuditMode::Disabled => Arc::new(NoOpAuditSink),
        };
        Self::with_audit_sink(uow_factory, config, sink)
    }

    pub fn with_audit_sink(
        uow_factory: Arc<dyn UnitOfWorkFactory>,
        config: &AccessConfig,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Self {
        let rules = Arc::new(config.archetypes.clone());
        Self {
            assignments: RoleAssignmentService::new(
                uow_factory.clone(),
                rules.clone(),
                audit_sink.clone(),
            ),
            permissions: PermissionResolver::new(uow_factory.clone()),
            catalog: CatalogCommandHandler::new(uow_factory.clone(), rules, audit_sink),
            catalog_queries: CatalogQueryHandler::new(uow_factory),
        }
    }

    /// 连接数据库 (带重试) 并装配
    pub async fn connect(config: &ServiceConfig) -> AppResult<(Self, PgPool)> {
        let pg_config = PostgresConfig::from(&config.app.database);
        let pool = connect_with_retry(&pg_config, &RetryConfig::default()).await?;
        let factory = Arc::new(PostgresUnitOfWorkFactory::new(pool.clone()));
        Ok((Self::new(factory, &config.access), pool))
    }
}
