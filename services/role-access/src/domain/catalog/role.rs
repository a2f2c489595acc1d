//! 角色实体

use clinic_common::{ActorId, AuditInfo};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 角色 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub Uuid);

impl RoleId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RoleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// 角色实体
///
/// 名称在未删除的角色中大小写不敏感唯一。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub note: Option<String>,
    pub deleted: bool,
    pub audit_info: AuditInfo,
}

impl Role {
    pub fn new(name: String, note: Option<String>, actor: Option<ActorId>) -> Self {
        Self {
            id: RoleId::new(),
            name,
            note,
            deleted: false,
            audit_info: AuditInfo::new(actor),
        }
    }

    /// 更新角色信息
    pub fn update(&mut self, name: String, note: Option<String>, actor: Option<ActorId>) {
        self.name = name;
        self.note = note;
        self.audit_info.touch(actor);
    }

    pub fn mark_deleted(&mut self, actor: Option<ActorId>) {
        self.deleted = true;
        self.audit_info.touch(actor);
    }

    pub fn restore(&mut self, actor: Option<ActorId>) {
        self.deleted = false;
        self.audit_info.touch(actor);
    }
}

/// 角色及其持有人数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub role: Role,
    /// 持有未删除分配的账户数
    pub holder_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_role() {
        let role = Role::new("Practitioner".to_string(), Some("Clinic staff".to_string()), None);
        assert_eq!(role.name, "Practitioner");
        assert!(!role.deleted);
    }

    #[test]
    fn test_delete_and_restore() {
        let mut role = Role::new("Admin".to_string(), None, None);
        role.mark_deleted(None);
        assert!(role.deleted);
        role.restore(None);
        assert!(!role.deleted);
    }
}
