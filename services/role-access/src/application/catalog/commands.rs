//! 目录命令定义

use clinic_common::ActorId;
use clinic_errors::AppResult;

use crate::domain::catalog::{PermissionId, RoleId, validate_name, validate_note};

/// 创建角色命令
#[derive(Debug, Clone)]
pub struct CreateRoleCommand {
    pub name: String,
    pub note: Option<String>,
    /// 执行操作的用户 ID (用于审计)
    pub performed_by: Option<ActorId>,
}

impl CreateRoleCommand {
    /// 验证并规范化命令参数
    pub fn validate(self) -> AppResult<Self> {
        Ok(Self {
            name: validate_name("Role name", &self.name)?,
            note: validate_note("Role note", self.note)?,
            performed_by: self.performed_by,
        })
    }
}

/// 更新角色命令
#[derive(Debug, Clone)]
pub struct UpdateRoleCommand {
    pub role_id: RoleId,
    pub name: String,
    pub note: Option<String>,
    pub performed_by: Option<ActorId>,
}

impl UpdateRoleCommand {
    pub fn validate(self) -> AppResult<Self> {
        Ok(Self {
            role_id: self.role_id,
            name: validate_name("Role name", &self.name)?,
            note: validate_note("Role note", self.note)?,
            performed_by: self.performed_by,
        })
    }
}

/// 删除 (软删除) 或恢复角色命令
#[derive(Debug, Clone)]
pub struct RoleLifecycleCommand {
    pub role_id: RoleId,
    pub performed_by: Option<ActorId>,
}

/// 创建权限命令
#[derive(Debug, Clone)]
pub struct CreatePermissionCommand {
    pub name: String,
    pub resource_type: String,
    pub description: Option<String>,
    pub performed_by: Option<ActorId>,
}

impl CreatePermissionCommand {
    pub fn validate(self) -> AppResult<Self> {
        Ok(Self {
            name: validate_name("Permission name", &self.name)?,
            resource_type: validate_name("Resource type", &self.resource_type)?,
            description: validate_note("Permission description", self.description)?,
            performed_by: self.performed_by,
        })
    }
}

/// 更新权限命令
#[derive(Debug, Clone)]
pub struct UpdatePermissionCommand {
    pub permission_id: PermissionId,
    pub name: String,
    pub resource_type: String,
    pub description: Option<String>,
    pub performed_by: Option<ActorId>,
}

impl UpdatePermissionCommand {
    pub fn validate(self) -> AppResult<Self> {
        Ok(Self {
            permission_id: self.permission_id,
            name: validate_name("Permission name", &self.name)?,
            resource_type: validate_name("Resource type", &self.resource_type)?,
            description: validate_note("Permission description", self.description)?,
            performed_by: self.performed_by,
        })
    }
}

/// 删除权限命令
#[derive(Debug, Clone)]
pub struct DeletePermissionCommand {
    pub permission_id: PermissionId,
    pub performed_by: Option<ActorId>,
}

/// 关联或取消关联角色权限命令
#[derive(Debug, Clone)]
pub struct RolePermissionCommand {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
    pub performed_by: Option<ActorId>,
}
