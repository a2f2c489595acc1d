//! 目录命令处理器

use std::sync::Arc;

use clinic_common::ActorId;
use clinic_errors::{AppError, AppResult};
use clinic_ports::{AuditEntry, AuditSink};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::commands::*;
use crate::application::audit::{AuditRecorder, audit_value};
use crate::application::transaction::complete;
use crate::domain::archetype::{Archetype, ArchetypeRules};
use crate::domain::catalog::{LinkChange, Permission, Role, RoleId, RolePermissionLink};
use crate::domain::services::resettle_identity;
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory};
use crate::infrastructure::metrics::AccessMetrics;

/// 关联结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkOutcome {
    pub link: RolePermissionLink,
    pub change: LinkChange,
}

/// 目录命令处理器
///
/// 角色改名、删除或恢复会改变持有人的原型时，同一事务内重新安放持有人的权威记录。
pub struct CatalogCommandHandler {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
    rules: Arc<ArchetypeRules>,
    audit: AuditRecorder,
}

impl CatalogCommandHandler {
    pub fn new(
        uow_factory: Arc<dyn UnitOfWorkFactory>,
        rules: Arc<ArchetypeRules>,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            uow_factory,
            rules,
            audit: AuditRecorder::new(audit_sink),
        }
    }

    /// 角色名对权威记录的影响：原型与 super-admin 标记
    fn placement_of(&self, role_name: &str) -> (Archetype, bool) {
        (
            self.rules.resolve(role_name),
            self.rules.is_super_admin(role_name),
        )
    }

    /// 逐个锁定持有人并按其现有角色重新安放记录，返回持有人数
    async fn resettle_holders(
        &self,
        uow: &dyn UnitOfWork,
        role_id: &RoleId,
        actor: Option<ActorId>,
    ) -> AppResult<usize> {
        let holders = uow.assignments().holders_of(role_id).await?;
        for identity_id in &holders {
            uow.lock_identity(identity_id).await?;
            resettle_identity(uow, &self.rules, identity_id, actor).await?;
        }
        Ok(holders.len())
    }

    /// 创建角色
    #[instrument(skip(self, cmd), fields(name = %cmd.name))]
    pub async fn create_role(&self, cmd: CreateRoleCommand) -> AppResult<Role> {
        let cmd = cmd.validate()?;
        let uow = self.uow_factory.begin().await?;

        let result: AppResult<Role> = async {
            if uow.roles().exists_by_name(&cmd.name, None).await? {
                return Err(AppError::conflict(format!(
                    "Role with name '{}' already exists",
                    cmd.name
                )));
            }
            let role = Role::new(cmd.name.clone(), cmd.note.clone(), cmd.performed_by);
            uow.roles().create(&role).await?;
            Ok(role)
        }
        .await;
        let role = complete(uow, result, "create_role").await?;

        AccessMetrics::record_catalog_change("role", "create");
        info!(role_id = %role.id, "Role created");
        self.audit
            .record(
                AuditEntry::new(cmd.performed_by, "role.created", "role", role.id.to_string())
                    .with_new_value(audit_value(&role)),
            )
            .await;
        Ok(role)
    }

    /// 更新角色名称与备注
    #[instrument(skip(self, cmd), fields(role_id = %cmd.role_id))]
    pub async fn update_role(&self, cmd: UpdateRoleCommand) -> AppResult<Role> {
        let cmd = cmd.validate()?;
        let uow = self.uow_factory.begin().await?;

        let result: AppResult<(Role, Role)> = async {
            let mut role = uow
                .roles()
                .find_by_id(&cmd.role_id)
                .await?
                .filter(|r| !r.deleted)
                .ok_or_else(|| AppError::not_found(format!("Role {} not found", cmd.role_id)))?;
            if uow
                .roles()
                .exists_by_name(&cmd.name, Some(&cmd.role_id))
                .await?
            {
                return Err(AppError::conflict(format!(
                    "Role with name '{}' already exists",
                    cmd.name
                )));
            }
            let before = role.clone();
            role.update(cmd.name.clone(), cmd.note.clone(), cmd.performed_by);
            uow.roles().update(&role).await?;
            if self.placement_of(&before.name) != self.placement_of(&role.name) {
                let moved = self
                    .resettle_holders(uow.as_ref(), &role.id, cmd.performed_by)
                    .await?;
                info!(role_id = %role.id, holders = moved, "Holders resettled after rename");
            }
            Ok((before, role))
        }
        .await;
        let (before, role) = complete(uow, result, "update_role").await?;

        AccessMetrics::record_catalog_change("role", "update");
        self.audit
            .record(
                AuditEntry::new(cmd.performed_by, "role.updated", "role", role.id.to_string())
                    .with_old_value(audit_value(&before))
                    .with_new_value(audit_value(&role)),
            )
            .await;
        Ok(role)
    }

    /// 软删除角色
    ///
    /// 台账行保留，权限解析与记录归位都忽略已删除的角色。
    #[instrument(skip(self, cmd), fields(role_id = %cmd.role_id))]
    pub async fn delete_role(&self, cmd: RoleLifecycleCommand) -> AppResult<Role> {
        let uow = self.uow_factory.begin().await?;

        let result: AppResult<Role> = async {
            let mut role = uow
                .roles()
                .find_by_id(&cmd.role_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Role {} not found", cmd.role_id)))?;
            if role.deleted {
                return Err(AppError::conflict(format!(
                    "Role {} is already deleted",
                    cmd.role_id
                )));
            }
            role.mark_deleted(cmd.performed_by);
            uow.roles().update(&role).await?;
            if self.rules.resolve(&role.name).is_elevated() {
                self.resettle_holders(uow.as_ref(), &role.id, cmd.performed_by)
                    .await?;
            }
            Ok(role)
        }
        .await;
        let role = complete(uow, result, "delete_role").await?;

        AccessMetrics::record_catalog_change("role", "delete");
        info!(role_id = %role.id, "Role deleted");
        self.audit
            .record(AuditEntry::new(
                cmd.performed_by,
                "role.deleted",
                "role",
                role.id.to_string(),
            ))
            .await;
        Ok(role)
    }

    /// 恢复已删除的角色
    #[instrument(skip(self, cmd), fields(role_id = %cmd.role_id))]
    pub async fn restore_role(&self, cmd: RoleLifecycleCommand) -> AppResult<Role> {
        let uow = self.uow_factory.begin().await?;

        let result: AppResult<Role> = async {
            let mut role = uow
                .roles()
                .find_by_id(&cmd.role_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Role {} not found", cmd.role_id)))?;
            if !role.deleted {
                return Err(AppError::conflict(format!(
                    "Role {} is not deleted",
                    cmd.role_id
                )));
            }
            // 删除期间可能已有同名角色
            if uow
                .roles()
                .exists_by_name(&role.name, Some(&role.id))
                .await?
            {
                return Err(AppError::conflict(format!(
                    "Role with name '{}' already exists",
                    role.name
                )));
            }
            role.restore(cmd.performed_by);
            uow.roles().update(&role).await?;
            if self.rules.resolve(&role.name).is_elevated() {
                self.resettle_holders(uow.as_ref(), &role.id, cmd.performed_by)
                    .await?;
            }
            Ok(role)
        }
        .await;
        let role = complete(uow, result, "restore_role").await?;

        AccessMetrics::record_catalog_change("role", "restore");
        self.audit
            .record(AuditEntry::new(
                cmd.performed_by,
                "role.restored",
                "role",
                role.id.to_string(),
            ))
            .await;
        Ok(role)
    }

    /// 创建权限
    #[instrument(skip(self, cmd), fields(name = %cmd.name))]
    pub async fn create_permission(&self, cmd: CreatePermissionCommand) -> AppResult<Permission> {
        let cmd = cmd.validate()?;
        let uow = self.uow_factory.begin().await?;

        let result: AppResult<Permission> = async {
            if uow.permissions().exists_by_name(&cmd.name, None).await? {
                return Err(AppError::conflict(format!(
                    "Permission with name '{}' already exists",
                    cmd.name
                )));
            }
            let permission = Permission::new(
                cmd.name.clone(),
                cmd.resource_type.clone(),
                cmd.description.clone(),
            );
            uow.permissions().create(&permission).await?;
            Ok(permission)
        }
        .await;
        let permission = complete(uow, result, "create_permission").await?;

        AccessMetrics::record_catalog_change("permission", "create");
        info!(permission_id = %permission.id, "Permission created");
        self.audit
            .record(
                AuditEntry::new(
                    cmd.performed_by,
                    "permission.created",
                    "permission",
                    permission.id.to_string(),
                )
                .with_new_value(audit_value(&permission)),
            )
            .await;
        Ok(permission)
    }

    /// 更新权限
    #[instrument(skip(self, cmd), fields(permission_id = %cmd.permission_id))]
    pub async fn update_permission(&self, cmd: UpdatePermissionCommand) -> AppResult<Permission> {
        let cmd = cmd.validate()?;
        let uow = self.uow_factory.begin().await?;

        let result: AppResult<(Permission, Permission)> = async {
            let mut permission = uow
                .permissions()
                .find_by_id(&cmd.permission_id)
                .await?
                .filter(|p| !p.deleted)
                .ok_or_else(|| {
                    AppError::not_found(format!("Permission {} not found", cmd.permission_id))
                })?;
            if uow
                .permissions()
                .exists_by_name(&cmd.name, Some(&cmd.permission_id))
                .await?
            {
                return Err(AppError::conflict(format!(
                    "Permission with name '{}' already exists",
                    cmd.name
                )));
            }
            let before = permission.clone();
            permission.update(
                cmd.name.clone(),
                cmd.resource_type.clone(),
                cmd.description.clone(),
            );
            uow.permissions().update(&permission).await?;
            Ok((before, permission))
        }
        .await;
        let (before, permission) = complete(uow, result, "update_permission").await?;

        AccessMetrics::record_catalog_change("permission", "update");
        self.audit
            .record(
                AuditEntry::new(
                    cmd.performed_by,
                    "permission.updated",
                    "permission",
                    permission.id.to_string(),
                )
                .with_old_value(audit_value(&before))
                .with_new_value(audit_value(&permission)),
            )
            .await;
        Ok(permission)
    }

    /// 软删除权限
    #[instrument(skip(self, cmd), fields(permission_id = %cmd.permission_id))]
    pub async fn delete_permission(&self, cmd: DeletePermissionCommand) -> AppResult<Permission> {
        let uow = self.uow_factory.begin().await?;

        let result: AppResult<Permission> = async {
            let mut permission = uow
                .permissions()
                .find_by_id(&cmd.permission_id)
                .await?
                .ok_or_else(|| {
                    AppError::not_found(format!("Permission {} not found", cmd.permission_id))
                })?;
            if permission.deleted {
                return Err(AppError::conflict(format!(
                    "Permission {} is already deleted",
                    cmd.permission_id
                )));
            }
            permission.mark_deleted();
            uow.permissions().update(&permission).await?;
            Ok(permission)
        }
        .await;
        let permission = complete(uow, result, "delete_permission").await?;

        AccessMetrics::record_catalog_change("permission", "delete");
        self.audit
            .record(AuditEntry::new(
                cmd.performed_by,
                "permission.deleted",
                "permission",
                permission.id.to_string(),
            ))
            .await;
        Ok(permission)
    }

    /// 为角色关联权限，已取消的关联会被恢复
    #[instrument(skip(self, cmd), fields(role_id = %cmd.role_id, permission_id = %cmd.permission_id))]
    pub async fn link_permission(&self, cmd: RolePermissionCommand) -> AppResult<LinkOutcome> {
        let uow = self.uow_factory.begin().await?;

        let result: AppResult<LinkOutcome> = async {
            uow.roles()
                .find_by_id(&cmd.role_id)
                .await?
                .filter(|r| !r.deleted)
                .ok_or_else(|| AppError::not_found(format!("Role {} not found", cmd.role_id)))?;
            uow.permissions()
                .find_by_id(&cmd.permission_id)
                .await?
                .filter(|p| !p.deleted)
                .ok_or_else(|| {
                    AppError::not_found(format!("Permission {} not found", cmd.permission_id))
                })?;

            let existing = uow
                .role_permissions()
                .find_link(&cmd.role_id, &cmd.permission_id)
                .await?;
            let outcome = match existing {
                // 已关联，无需写入
                Some(link) if !link.deleted => LinkOutcome {
                    link,
                    change: LinkChange::Unchanged,
                },
                Some(mut link) => {
                    link.relink(cmd.performed_by);
                    uow.role_permissions().save_link(&link).await?;
                    LinkOutcome {
                        link,
                        change: LinkChange::Restored,
                    }
                }
                None => {
                    let link = RolePermissionLink::new(
                        cmd.role_id,
                        cmd.permission_id,
                        cmd.performed_by,
                    );
                    uow.role_permissions().save_link(&link).await?;
                    LinkOutcome {
                        link,
                        change: LinkChange::Inserted,
                    }
                }
            };
            Ok(outcome)
        }
        .await;
        let outcome = complete(uow, result, "link_permission").await?;

        if outcome.change != LinkChange::Unchanged {
            AccessMetrics::record_catalog_change("role_permission", "link");
            info!(change = outcome.change.as_str(), "Permission linked");
            self.audit
                .record(
                    AuditEntry::new(
                        cmd.performed_by,
                        "role_permission.linked",
                        "role_permission",
                        format!("{}:{}", cmd.role_id, cmd.permission_id),
                    )
                    .with_new_value(audit_value(&outcome)),
                )
                .await;
        }
        Ok(outcome)
    }

    /// 取消角色与权限的关联 (软删除)
    #[instrument(skip(self, cmd), fields(role_id = %cmd.role_id, permission_id = %cmd.permission_id))]
    pub async fn unlink_permission(
        &self,
        cmd: RolePermissionCommand,
    ) -> AppResult<RolePermissionLink> {
        let uow = self.uow_factory.begin().await?;

        let result: AppResult<RolePermissionLink> = async {
            let mut link = uow
                .role_permissions()
                .find_link(&cmd.role_id, &cmd.permission_id)
                .await?
                .ok_or_else(|| {
                    AppError::not_found(format!(
                        "Permission {} was never linked to role {}",
                        cmd.permission_id, cmd.role_id
                    ))
                })?;
            if link.deleted {
                return Err(AppError::conflict(format!(
                    "Permission {} is already unlinked from role {}",
                    cmd.permission_id, cmd.role_id
                )));
            }
            link.unlink(cmd.performed_by);
            uow.role_permissions().save_link(&link).await?;
            Ok(link)
        }
        .await;
        let link = complete(uow, result, "unlink_permission").await?;

        AccessMetrics::record_catalog_change("role_permission", "unlink");
        self.audit
            .record(AuditEntry::new(
                cmd.performed_by,
                "role_permission.unlinked",
                "role_permission",
                format!("{}:{}", cmd.role_id, cmd.permission_id),
            ))
            .await;
        Ok(link)
    }
}
