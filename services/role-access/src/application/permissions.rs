//! 权限解析

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use clinic_common::IdentityId;
use clinic_errors::AppResult;
use tracing::{debug, instrument};

use crate::application::transaction::complete;
use crate::domain::catalog::Permission;
use crate::domain::unit_of_work::UnitOfWorkFactory;
use crate::infrastructure::metrics::AccessMetrics;

/// 权限解析器
///
/// 有效权限 = 有效分配 → 有效角色 → 有效关联 → 有效权限。只读，不加锁。
pub struct PermissionResolver {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl PermissionResolver {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }

    /// 账户的有效权限名集合，未持有任何角色时为空
    #[instrument(skip(self), fields(identity_id = %identity_id))]
    pub async fn effective_permissions(
        &self,
        identity_id: &IdentityId,
    ) -> AppResult<BTreeSet<String>> {
        let names: BTreeSet<String> = self
            .effective_permission_details(identity_id)
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();
        debug!(granted = names.len(), "Effective permissions resolved");
        Ok(names)
    }

    /// 有效权限的完整记录，按名称排序
    pub async fn effective_permission_details(
        &self,
        identity_id: &IdentityId,
    ) -> AppResult<Vec<Permission>> {
        let start = Instant::now();
        let uow = self.uow_factory.begin_read_only().await?;
        let result = uow.assignments().effective_permissions(identity_id).await;
        let permissions = complete(uow, result, "effective_permissions").await?;
        AccessMetrics::record_resolution(start, permissions.len());
        Ok(permissions)
    }

    /// 账户是否拥有指定权限
    pub async fn has_permission(&self, identity_id: &IdentityId, name: &str) -> AppResult<bool> {
        Ok(self.effective_permissions(identity_id).await?.contains(name))
    }
}
