//! 仓储接口
//!
//! 所有实现都在 Unit of Work 的事务内执行。

use async_trait::async_trait;
use clinic_common::{ActorId, IdentityId, Pagination};
use clinic_errors::AppResult;

use super::assignment::{HeldRole, RoleAssignment};
use super::catalog::{
    Permission, PermissionId, PermissionSummary, Role, RoleId, RolePermissionLink, RoleSummary,
};
use super::identity::Identity;
use super::profile::{ProfileKind, SpecializedProfile};

/// 目录列表过滤条件
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    /// 名称片段，大小写不敏感
    pub search: Option<String>,
    pub include_deleted: bool,
    pub pagination: Pagination,
}

impl CatalogFilter {
    pub fn matches(&self, name: &str, deleted: bool) -> bool {
        if deleted && !self.include_deleted {
            return false;
        }
        match &self.search {
            Some(fragment) => name.to_lowercase().contains(&fragment.to_lowercase()),
            None => true,
        }
    }
}

/// 角色仓储接口
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// 创建角色
    async fn create(&self, role: &Role) -> AppResult<()>;

    /// 更新角色 (含软删除标记)
    async fn update(&self, role: &Role) -> AppResult<()>;

    /// 根据 ID 查找角色，包括已删除的
    async fn find_by_id(&self, id: &RoleId) -> AppResult<Option<Role>>;

    /// 按名称查找未删除的角色，大小写不敏感
    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>>;

    /// 未删除的角色中是否已有该名称
    async fn exists_by_name(&self, name: &str, exclude: Option<&RoleId>) -> AppResult<bool>;

    /// 分页列出角色及持有人数
    async fn list(&self, filter: &CatalogFilter) -> AppResult<(Vec<RoleSummary>, u64)>;
}

/// 权限仓储接口
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn create(&self, permission: &Permission) -> AppResult<()>;

    async fn update(&self, permission: &Permission) -> AppResult<()>;

    async fn find_by_id(&self, id: &PermissionId) -> AppResult<Option<Permission>>;

    /// 未删除的权限中是否已有该名称
    async fn exists_by_name(&self, name: &str, exclude: Option<&PermissionId>)
    -> AppResult<bool>;

    /// 分页列出权限及引用角色数
    async fn list(&self, filter: &CatalogFilter) -> AppResult<(Vec<PermissionSummary>, u64)>;
}

/// 角色权限关联仓储接口
#[async_trait]
pub trait RolePermissionRepository: Send + Sync {
    async fn find_link(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AppResult<Option<RolePermissionLink>>;

    /// 按 (role, permission) 插入或覆盖
    async fn save_link(&self, link: &RolePermissionLink) -> AppResult<()>;

    /// 角色当前授予的未删除权限，按名称排序
    async fn permissions_of_role(&self, role_id: &RoleId) -> AppResult<Vec<Permission>>;
}

/// 角色分配台账仓储接口
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    async fn find(
        &self,
        identity_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<Option<RoleAssignment>>;

    /// 按 (identity, role) 插入或覆盖
    async fn save(&self, assignment: &RoleAssignment) -> AppResult<()>;

    /// 清除该账户其他有效分配的主角色标记，返回受影响行数
    async fn clear_primary(
        &self,
        identity_id: &IdentityId,
        except: &RoleId,
        actor: Option<ActorId>,
    ) -> AppResult<u64>;

    /// 账户的台账行及对应角色
    async fn list_for_identity(
        &self,
        identity_id: &IdentityId,
        include_deleted: bool,
    ) -> AppResult<Vec<HeldRole>>;

    /// 持有该角色 (分配未撤销) 的账户，按 ID 排序
    async fn holders_of(&self, role_id: &RoleId) -> AppResult<Vec<IdentityId>>;

    /// 有效分配 → 有效角色 → 有效关联 → 有效权限，按名称去重排序
    async fn effective_permissions(&self, identity_id: &IdentityId) -> AppResult<Vec<Permission>>;
}

/// 账户仓储接口
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    async fn find_by_id(&self, id: &IdentityId) -> AppResult<Option<Identity>>;

    /// 按 ID 插入或覆盖
    async fn save(&self, identity: &Identity) -> AppResult<()>;
}

/// 专属档案仓储接口
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find(&self, id: &IdentityId, kind: ProfileKind)
    -> AppResult<Option<SpecializedProfile>>;

    /// 该 ID 在各档案表中的记录 (含隐藏的)
    async fn list_for_identity(&self, id: &IdentityId) -> AppResult<Vec<SpecializedProfile>>;

    /// 按 (kind, id) 插入或覆盖
    async fn save(&self, profile: &SpecializedProfile) -> AppResult<()>;
}
