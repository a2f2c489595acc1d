//! PostgreSQL Unit of Work 实现

use async_trait::async_trait;
use clinic_adapter_postgres::{TransactionOptions, advisory_xact_lock, begin_with_options};
use clinic_common::IdentityId;
use clinic_errors::{AppError, AppResult};
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::tx_repositories::{
    SharedTx, TxIdentityRepository, TxPermissionRepository, TxProfileRepository,
    TxRoleAssignmentRepository, TxRolePermissionRepository, TxRoleRepository,
};
use crate::domain::repository::{
    IdentityRepository, PermissionRepository, ProfileRepository, RoleAssignmentRepository,
    RolePermissionRepository, RoleRepository,
};
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory};

/// Postgres Unit of Work 工厂
pub struct PostgresUnitOfWorkFactory {
    pool: PgPool,
}

impl PostgresUnitOfWorkFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWorkFactory for PostgresUnitOfWorkFactory {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = begin_with_options(&self.pool, &TransactionOptions::new()).await?;
        Ok(Box::new(PostgresUnitOfWork::new(tx)))
    }

    async fn begin_read_only(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = begin_with_options(&self.pool, &TransactionOptions::new().read_only()).await?;
        Ok(Box::new(PostgresUnitOfWork::new(tx)))
    }
}

/// Postgres Unit of Work 实现
pub struct PostgresUnitOfWork {
    tx: SharedTx,
    role_repo: TxRoleRepository,
    permission_repo: TxPermissionRepository,
    role_permission_repo: TxRolePermissionRepository,
    assignment_repo: TxRoleAssignmentRepository,
    identity_repo: TxIdentityRepository,
    profile_repo: TxProfileRepository,
}

impl PostgresUnitOfWork {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        let tx = Arc::new(Mutex::new(Some(tx)));

        Self {
            tx: tx.clone(),
            role_repo: TxRoleRepository::new(tx.clone()),
            permission_repo: TxPermissionRepository::new(tx.clone()),
            role_permission_repo: TxRolePermissionRepository::new(tx.clone()),
            assignment_repo: TxRoleAssignmentRepository::new(tx.clone()),
            identity_repo: TxIdentityRepository::new(tx.clone()),
            profile_repo: TxProfileRepository::new(tx),
        }
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    fn roles(&self) -> &dyn RoleRepository {
        &self.role_repo
    }

    fn permissions(&self) -> &dyn PermissionRepository {
        &self.permission_repo
    }

    fn role_permissions(&self) -> &dyn RolePermissionRepository {
        &self.role_permission_repo
    }

    fn assignments(&self) -> &dyn RoleAssignmentRepository {
        &self.assignment_repo
    }

    fn identities(&self) -> &dyn IdentityRepository {
        &self.identity_repo
    }

    fn profiles(&self) -> &dyn ProfileRepository {
        &self.profile_repo
    }

    async fn lock_identity(&self, id: &IdentityId) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        advisory_xact_lock(tx, &format!("identity:{}", id)).await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .take()
            .ok_or_else(|| AppError::internal("Transaction already consumed"))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .take()
            .ok_or_else(|| AppError::internal("Transaction already consumed"))?;

        tx.rollback()
            .await
            .map_err(|e| AppError::database(format!("Failed to rollback transaction: {}", e)))?;

        Ok(())
    }
}
