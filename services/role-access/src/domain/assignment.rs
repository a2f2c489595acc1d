//! 角色分配台账

use clinic_common::{ActorId, AuditInfo, IdentityId};
use serde::{Deserialize, Serialize};

use super::catalog::{Role, RoleId};

/// 台账行，每对 (identity, role) 只有一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub identity_id: IdentityId,
    pub role_id: RoleId,
    pub is_primary: bool,
    pub deleted: bool,
    pub audit_info: AuditInfo,
}

/// 分配写入角色分配台账时发生的变化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerChange {
    /// 新建行
    Inserted,
    /// 恢复已撤销的行
    Restored,
    /// 行已有效，仅刷新主角色标记
    Updated,
}

impl LedgerChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerChange::Inserted => "inserted",
            LedgerChange::Restored => "restored",
            LedgerChange::Updated => "updated",
        }
    }
}

impl RoleAssignment {
    pub fn new(
        identity_id: IdentityId,
        role_id: RoleId,
        is_primary: bool,
        actor: Option<ActorId>,
    ) -> Self {
        Self {
            identity_id,
            role_id,
            is_primary,
            deleted: false,
            audit_info: AuditInfo::new(actor),
        }
    }

    /// 再次分配：恢复已撤销的行或刷新主角色标记
    pub fn reassign(&mut self, is_primary: bool, actor: Option<ActorId>) -> LedgerChange {
        let change = if self.deleted {
            LedgerChange::Restored
        } else {
            LedgerChange::Updated
        };
        self.deleted = false;
        self.is_primary = is_primary;
        self.audit_info.touch(actor);
        change
    }

    pub fn revoke(&mut self, actor: Option<ActorId>) {
        self.deleted = true;
        self.is_primary = false;
        self.audit_info.touch(actor);
    }

    pub fn is_active(&self) -> bool {
        !self.deleted
    }
}

/// 台账行与其角色
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldRole {
    pub assignment: RoleAssignment,
    pub role: Role,
}

impl HeldRole {
    /// 分配与角色都未删除
    pub fn is_active(&self) -> bool {
        self.assignment.is_active() && !self.role.deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reassign_reports_restore() {
        let mut assignment = RoleAssignment::new(IdentityId::new(), RoleId::new(), true, None);
        assignment.revoke(None);
        assert!(assignment.deleted);
        assert!(!assignment.is_primary);

        assert_eq!(assignment.reassign(false, None), LedgerChange::Restored);
        assert!(assignment.is_active());
        assert_eq!(assignment.reassign(true, None), LedgerChange::Updated);
        assert!(assignment.is_primary);
    }
}
