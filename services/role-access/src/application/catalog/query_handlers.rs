//! 目录查询处理器

use std::sync::Arc;

use clinic_common::PagedResult;
use clinic_errors::{AppError, AppResult};

use super::queries::*;
use crate::application::transaction::complete;
use crate::domain::catalog::{
    Permission, PermissionId, PermissionSummary, Role, RoleId, RoleSummary,
};
use crate::domain::repository::CatalogFilter;
use crate::domain::unit_of_work::UnitOfWorkFactory;

/// 目录查询处理器，全部在只读事务中执行
pub struct CatalogQueryHandler {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl CatalogQueryHandler {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }

    /// 获取角色详情 (含已删除的)
    pub async fn get_role(&self, role_id: &RoleId) -> AppResult<Role> {
        let uow = self.uow_factory.begin_read_only().await?;
        let result = uow.roles().find_by_id(role_id).await;
        complete(uow, result, "get_role")
            .await?
            .ok_or_else(|| AppError::not_found(format!("Role {} not found", role_id)))
    }

    /// 按名称获取未删除的角色
    pub async fn get_role_by_name(&self, name: &str) -> AppResult<Role> {
        let uow = self.uow_factory.begin_read_only().await?;
        let result = uow.roles().find_by_name(name).await;
        complete(uow, result, "get_role_by_name")
            .await?
            .ok_or_else(|| AppError::not_found(format!("Role '{}' not found", name)))
    }

    /// 分页列出角色及持有人数
    pub async fn list_roles(&self, query: ListRolesQuery) -> AppResult<PagedResult<RoleSummary>> {
        self.role_page(query.into()).await
    }

    /// 按名称片段搜索未删除的角色
    pub async fn search_roles(
        &self,
        query: SearchRolesQuery,
    ) -> AppResult<PagedResult<RoleSummary>> {
        if query.query.trim().is_empty() {
            return Err(AppError::validation("Search query must not be empty"));
        }
        self.role_page(query.into()).await
    }

    /// 获取权限详情 (含已删除的)
    pub async fn get_permission(&self, permission_id: &PermissionId) -> AppResult<Permission> {
        let uow = self.uow_factory.begin_read_only().await?;
        let result = uow.permissions().find_by_id(permission_id).await;
        complete(uow, result, "get_permission")
            .await?
            .ok_or_else(|| AppError::not_found(format!("Permission {} not found", permission_id)))
    }

    /// 分页列出权限及引用角色数
    pub async fn list_permissions(
        &self,
        query: ListPermissionsQuery,
    ) -> AppResult<PagedResult<PermissionSummary>> {
        let filter: CatalogFilter = query.into();
        let uow = self.uow_factory.begin_read_only().await?;
        let result = uow.permissions().list(&filter).await;
        let (items, total) = complete(uow, result, "list_permissions").await?;
        Ok(PagedResult::new(items, total, &filter.pagination))
    }

    /// 角色当前授予的权限
    pub async fn role_permissions(&self, role_id: &RoleId) -> AppResult<Vec<Permission>> {
        let uow = self.uow_factory.begin_read_only().await?;
        let result: AppResult<Vec<Permission>> = async {
            uow.roles()
                .find_by_id(role_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Role {} not found", role_id)))?;
            uow.role_permissions().permissions_of_role(role_id).await
        }
        .await;
        complete(uow, result, "role_permissions").await
    }

    async fn role_page(&self, filter: CatalogFilter) -> AppResult<PagedResult<RoleSummary>> {
        let uow = self.uow_factory.begin_read_only().await?;
        let result = uow.roles().list(&filter).await;
        let (items, total) = complete(uow, result, "list_roles").await?;
        Ok(PagedResult::new(items, total, &filter.pagination))
    }
}
