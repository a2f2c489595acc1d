//! Unit of Work 模式
//!
//! 一次分配或撤销涉及台账、账户和档案三类存储，必须在同一事务中完成。

use async_trait::async_trait;
use clinic_common::IdentityId;
use clinic_errors::AppResult;

use super::repository::{
    IdentityRepository, PermissionRepository, ProfileRepository, RoleAssignmentRepository,
    RolePermissionRepository, RoleRepository,
};

/// Unit of Work trait
///
/// 协调多个 Repository 在同一事务中的操作。被丢弃而未提交时事务回滚。
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// 获取角色 Repository
    fn roles(&self) -> &dyn RoleRepository;

    /// 获取权限 Repository
    fn permissions(&self) -> &dyn PermissionRepository;

    /// 获取角色权限 Repository
    fn role_permissions(&self) -> &dyn RolePermissionRepository;

    /// 获取角色分配台账 Repository
    fn assignments(&self) -> &dyn RoleAssignmentRepository;

    /// 获取账户 Repository
    fn identities(&self) -> &dyn IdentityRepository;

    /// 获取专属档案 Repository
    fn profiles(&self) -> &dyn ProfileRepository;

    /// 获取账户级排他锁，持有到事务结束
    async fn lock_identity(&self, id: &IdentityId) -> AppResult<()>;

    /// 提交事务
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// 回滚事务
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Unit of Work 工厂 trait
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    /// 开始读写事务
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// 开始只读事务
    async fn begin_read_only(&self) -> AppResult<Box<dyn UnitOfWork>>;
}
