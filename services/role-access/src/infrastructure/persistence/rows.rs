//! 数据库行结构及到领域实体的转换

use chrono::{DateTime, Utc};
use clinic_common::{ActorId, AuditInfo, IdentityId};
use clinic_errors::{AppError, AppResult};
use uuid::Uuid;

use crate::domain::assignment::{HeldRole, RoleAssignment};
use crate::domain::catalog::{
    Permission, PermissionId, PermissionSummary, Role, RoleId, RolePermissionLink, RoleSummary,
};
use crate::domain::identity::{ContactInfo, Identity};
use crate::domain::profile::{ProfileDetails, ProfileKind, SpecializedProfile};

fn audit_info(
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
) -> AuditInfo {
    AuditInfo {
        created_at,
        created_by: created_by.map(ActorId::from_uuid),
        updated_at,
        updated_by: updated_by.map(ActorId::from_uuid),
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct IdentityRow {
    id: Uuid,
    full_name: String,
    email: Option<String>,
    phone: Option<String>,
    visible: bool,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        Identity {
            id: IdentityId::from_uuid(row.id),
            contact: ContactInfo {
                full_name: row.full_name,
                email: row.email,
                phone: row.phone,
            },
            visible: row.visible,
            audit_info: audit_info(row.created_at, row.created_by, row.updated_at, row.updated_by),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RoleRow {
    id: Uuid,
    name: String,
    note: Option<String>,
    deleted: bool,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: RoleId::from_uuid(row.id),
            name: row.name,
            note: row.note,
            deleted: row.deleted,
            audit_info: audit_info(row.created_at, row.created_by, row.updated_at, row.updated_by),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RoleSummaryRow {
    #[sqlx(flatten)]
    role: RoleRow,
    holder_count: i64,
}

impl From<RoleSummaryRow> for RoleSummary {
    fn from(row: RoleSummaryRow) -> Self {
        RoleSummary {
            role: row.role.into(),
            holder_count: row.holder_count.max(0) as u64,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PermissionRow {
    id: Uuid,
    name: String,
    resource_type: String,
    description: Option<String>,
    deleted: bool,
    created_at: DateTime<Utc>,
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Permission {
            id: PermissionId::from_uuid(row.id),
            name: row.name,
            resource_type: row.resource_type,
            description: row.description,
            deleted: row.deleted,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PermissionSummaryRow {
    #[sqlx(flatten)]
    permission: PermissionRow,
    role_count: i64,
}

impl From<PermissionSummaryRow> for PermissionSummary {
    fn from(row: PermissionSummaryRow) -> Self {
        PermissionSummary {
            permission: row.permission.into(),
            role_count: row.role_count.max(0) as u64,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct LinkRow {
    role_id: Uuid,
    permission_id: Uuid,
    deleted: bool,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
}

impl From<LinkRow> for RolePermissionLink {
    fn from(row: LinkRow) -> Self {
        RolePermissionLink {
            role_id: RoleId::from_uuid(row.role_id),
            permission_id: PermissionId::from_uuid(row.permission_id),
            deleted: row.deleted,
            audit_info: audit_info(row.created_at, row.created_by, row.updated_at, row.updated_by),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AssignmentRow {
    identity_id: Uuid,
    role_id: Uuid,
    is_primary: bool,
    deleted: bool,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
}

impl From<AssignmentRow> for RoleAssignment {
    fn from(row: AssignmentRow) -> Self {
        RoleAssignment {
            identity_id: IdentityId::from_uuid(row.identity_id),
            role_id: RoleId::from_uuid(row.role_id),
            is_primary: row.is_primary,
            deleted: row.deleted,
            audit_info: audit_info(row.created_at, row.created_by, row.updated_at, row.updated_by),
        }
    }
}

/// 台账行与角色的连接结果，角色列带 `role_` 前缀
#[derive(sqlx::FromRow)]
pub(crate) struct HeldRoleRow {
    #[sqlx(flatten)]
    assignment: AssignmentRow,
    role_name: String,
    role_note: Option<String>,
    role_deleted: bool,
    role_created_at: DateTime<Utc>,
    role_created_by: Option<Uuid>,
    role_updated_at: DateTime<Utc>,
    role_updated_by: Option<Uuid>,
}

impl From<HeldRoleRow> for HeldRole {
    fn from(row: HeldRoleRow) -> Self {
        let role = Role {
            id: RoleId::from_uuid(row.assignment.role_id),
            name: row.role_name,
            note: row.role_note,
            deleted: row.role_deleted,
            audit_info: audit_info(
                row.role_created_at,
                row.role_created_by,
                row.role_updated_at,
                row.role_updated_by,
            ),
        };
        HeldRole {
            assignment: row.assignment.into(),
            role,
        }
    }
}

/// 三张档案表的统一行形状，表中没有的列以 NULL 补齐
#[derive(sqlx::FromRow)]
pub(crate) struct ProfileRow {
    kind: String,
    id: Uuid,
    full_name: String,
    email: Option<String>,
    phone: Option<String>,
    license_number: Option<String>,
    specialty: Option<String>,
    is_super_admin: Option<bool>,
    registration_number: Option<String>,
    visible: bool,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
}

impl ProfileRow {
    pub(crate) fn into_profile(self) -> AppResult<SpecializedProfile> {
        let kind: ProfileKind = self.kind.parse().map_err(AppError::internal)?;
        let details = match kind {
            ProfileKind::Practitioner => ProfileDetails::Practitioner {
                license_number: self.license_number,
                specialty: self.specialty,
            },
            ProfileKind::Administrator => ProfileDetails::Administrator {
                is_super_admin: self.is_super_admin.unwrap_or(false),
            },
            ProfileKind::Organization => ProfileDetails::Organization {
                registration_number: self.registration_number,
            },
        };

        Ok(SpecializedProfile {
            id: IdentityId::from_uuid(self.id),
            contact: ContactInfo {
                full_name: self.full_name,
                email: self.email,
                phone: self.phone,
            },
            details,
            visible: self.visible,
            audit_info: audit_info(self.created_at, self.created_by, self.updated_at, self.updated_by),
        })
    }
}
