//! 角色分配命令与结果

use clinic_common::{ActorId, IdentityId};
use serde::{Deserialize, Serialize};

use crate::domain::archetype::Archetype;
use crate::domain::assignment::LedgerChange;
use crate::domain::catalog::RoleId;
use crate::domain::services::RecordLocation;

/// 分配角色命令
#[derive(Debug, Clone)]
pub struct AssignRoleCommand {
    pub identity_id: IdentityId,
    pub role_id: RoleId,
    pub is_primary: bool,
    /// 执行操作的用户 ID (用于审计)
    pub performed_by: Option<ActorId>,
}

impl AssignRoleCommand {
    pub fn new(identity_id: IdentityId, role_id: RoleId) -> Self {
        Self {
            identity_id,
            role_id,
            is_primary: false,
            performed_by: None,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn performed_by(mut self, actor: ActorId) -> Self {
        self.performed_by = Some(actor);
        self
    }
}

/// 撤销角色命令
#[derive(Debug, Clone)]
pub struct RevokeRoleCommand {
    pub identity_id: IdentityId,
    pub role_id: RoleId,
    pub performed_by: Option<ActorId>,
}

impl RevokeRoleCommand {
    pub fn new(identity_id: IdentityId, role_id: RoleId) -> Self {
        Self {
            identity_id,
            role_id,
            performed_by: None,
        }
    }

    pub fn performed_by(mut self, actor: ActorId) -> Self {
        self.performed_by = Some(actor);
        self
    }
}

/// 分配结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub identity_id: IdentityId,
    pub role_id: RoleId,
    pub role_name: String,
    pub archetype: Archetype,
    pub ledger: LedgerChange,
    pub is_primary: bool,
    /// 被清除主角色标记的其他分配数
    pub cleared_primary: u64,
    /// 分配后的权威记录位置
    pub authoritative: RecordLocation,
}

/// 撤销结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevocationOutcome {
    pub identity_id: IdentityId,
    pub role_id: RoleId,
    pub role_name: String,
    pub archetype: Archetype,
    pub was_primary: bool,
    /// 撤销后的权威记录位置
    pub authoritative: Option<RecordLocation>,
}
