//! 权限实体与角色-权限关联

use chrono::{DateTime, Utc};
use clinic_common::{ActorId, AuditInfo};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::RoleId;

/// 权限 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionId(pub Uuid);

impl PermissionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for PermissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PermissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PermissionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// 权限实体
///
/// 名称即授权检查使用的标识，例如 `patients:read`、`reports:export`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    /// 资源类型 (如 "patients", "reports")
    pub resource_type: String,
    pub description: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Permission {
    pub fn new(name: String, resource_type: String, description: Option<String>) -> Self {
        Self {
            id: PermissionId::new(),
            name,
            resource_type,
            description,
            deleted: false,
            created_at: Utc::now(),
        }
    }

    pub fn update(&mut self, name: String, resource_type: String, description: Option<String>) {
        self.name = name;
        self.resource_type = resource_type;
        self.description = description;
    }

    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }
}

/// 角色-权限关联
///
/// 每对 (role, permission) 只有一行；取消关联为软删除，再次关联时恢复。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePermissionLink {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
    pub deleted: bool,
    pub audit_info: AuditInfo,
}

impl RolePermissionLink {
    pub fn new(role_id: RoleId, permission_id: PermissionId, actor: Option<ActorId>) -> Self {
        Self {
            role_id,
            permission_id,
            deleted: false,
            audit_info: AuditInfo::new(actor),
        }
    }

    pub fn unlink(&mut self, actor: Option<ActorId>) {
        self.deleted = true;
        self.audit_info.touch(actor);
    }

    pub fn relink(&mut self, actor: Option<ActorId>) {
        self.deleted = false;
        self.audit_info.touch(actor);
    }
}

/// 关联操作对关联行的影响
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkChange {
    Inserted,
    /// 恢复已取消的关联
    Restored,
    /// 已关联，未写入
    Unchanged,
}

impl LinkChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkChange::Inserted => "inserted",
            LinkChange::Restored => "restored",
            LinkChange::Unchanged => "unchanged",
        }
    }
}

/// 权限及引用它的有效角色数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionSummary {
    pub permission: Permission,
    pub role_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_round_trip() {
        let mut link = RolePermissionLink::new(RoleId::new(), PermissionId::new(), None);
        assert!(!link.deleted);

        link.unlink(None);
        assert!(link.deleted);

        link.relink(None);
        assert!(!link.deleted);
    }
}
