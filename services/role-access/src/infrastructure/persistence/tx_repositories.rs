//! 事务内仓储
//!
//! 同一 Unit of Work 的所有仓储共享一个事务；档案三张表通过 UNION ALL 统一读取。

use async_trait::async_trait;
use chrono::Utc;
use clinic_common::{ActorId, IdentityId};
use clinic_errors::{AppError, AppResult};
use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::error_mapper::map_sqlx_error;
use super::rows::{
    AssignmentRow, HeldRoleRow, IdentityRow, LinkRow, PermissionRow, PermissionSummaryRow,
    ProfileRow, RoleRow, RoleSummaryRow,
};
use crate::domain::assignment::{HeldRole, RoleAssignment};
use crate::domain::catalog::{
    Permission, PermissionId, PermissionSummary, Role, RoleId, RolePermissionLink, RoleSummary,
};
use crate::domain::identity::Identity;
use crate::domain::profile::{ProfileDetails, ProfileKind, SpecializedProfile};
use crate::domain::repository::{
    CatalogFilter, IdentityRepository, PermissionRepository, ProfileRepository,
    RoleAssignmentRepository, RolePermissionRepository, RoleRepository,
};

/// 共享事务
pub type SharedTx = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

macro_rules! define_tx_repo {
    ($name:ident) => {
        pub struct $name {
            tx: SharedTx,
        }

        impl $name {
            pub fn new(tx: SharedTx) -> Self {
                Self { tx }
            }
        }
    };
}

define_tx_repo!(TxRoleRepository);
define_tx_repo!(TxPermissionRepository);
define_tx_repo!(TxRolePermissionRepository);
define_tx_repo!(TxRoleAssignmentRepository);
define_tx_repo!(TxIdentityRepository);
define_tx_repo!(TxProfileRepository);

/// ILIKE 模式，转义通配符
fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn search_pattern(filter: &CatalogFilter) -> Option<String> {
    filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern)
}

const ROLE_COLUMNS: &str =
    "r.id, r.name, r.note, r.deleted, r.created_at, r.created_by, r.updated_at, r.updated_by";

#[async_trait]
impl RoleRepository for TxRoleRepository {
    async fn create(&self, role: &Role) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        sqlx::query(
            r#"
            INSERT INTO roles (id, name, note, deleted, created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(role.id.0)
        .bind(&role.name)
        .bind(&role.note)
        .bind(role.deleted)
        .bind(role.audit_info.created_at)
        .bind(role.audit_info.created_by.map(|a| a.0))
        .bind(role.audit_info.updated_at)
        .bind(role.audit_info.updated_by.map(|a| a.0))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update(&self, role: &Role) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let result = sqlx::query(
            r#"
            UPDATE roles
            SET name = $2, note = $3, deleted = $4, updated_at = $5, updated_by = $6
            WHERE id = $1
            "#,
        )
        .bind(role.id.0)
        .bind(&role.name)
        .bind(&role.note)
        .bind(role.deleted)
        .bind(role.audit_info.updated_at)
        .bind(role.audit_info.updated_by.map(|a| a.0))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Role {} not found", role.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &RoleId) -> AppResult<Option<Role>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {} FROM roles r WHERE r.id = $1",
            ROLE_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Role::from))
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {} FROM roles r WHERE LOWER(r.name) = LOWER($1) AND NOT r.deleted",
            ROLE_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Role::from))
    }

    async fn exists_by_name(&self, name: &str, exclude: Option<&RoleId>) -> AppResult<bool> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM roles
                WHERE LOWER(name) = LOWER($1) AND NOT deleted
                  AND ($2::UUID IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(name)
        .bind(exclude.map(|id| id.0))
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(exists)
    }

    async fn list(&self, filter: &CatalogFilter) -> AppResult<(Vec<RoleSummary>, u64)> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let pattern = search_pattern(filter);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM roles r
            WHERE ($1 OR NOT r.deleted) AND ($2::TEXT IS NULL OR r.name ILIKE $2)
            "#,
        )
        .bind(filter.include_deleted)
        .bind(&pattern)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, RoleSummaryRow>(&format!(
            r#"
            SELECT {},
                   (SELECT COUNT(DISTINCT a.identity_id) FROM role_assignments a
                    WHERE a.role_id = r.id AND NOT a.deleted) AS holder_count
            FROM roles r
            WHERE ($1 OR NOT r.deleted) AND ($2::TEXT IS NULL OR r.name ILIKE $2)
            ORDER BY LOWER(r.name), r.id
            LIMIT $3 OFFSET $4
            "#,
            ROLE_COLUMNS
        ))
        .bind(filter.include_deleted)
        .bind(&pattern)
        .bind(filter.pagination.limit() as i64)
        .bind(filter.pagination.offset() as i64)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok((
            rows.into_iter().map(RoleSummary::from).collect(),
            total.max(0) as u64,
        ))
    }
}

const PERMISSION_COLUMNS: &str =
    "p.id, p.name, p.resource_type, p.description, p.deleted, p.created_at";

#[async_trait]
impl PermissionRepository for TxPermissionRepository {
    async fn create(&self, permission: &Permission) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        sqlx::query(
            r#"
            INSERT INTO permissions (id, name, resource_type, description, deleted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(permission.id.0)
        .bind(&permission.name)
        .bind(&permission.resource_type)
        .bind(&permission.description)
        .bind(permission.deleted)
        .bind(permission.created_at)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update(&self, permission: &Permission) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let result = sqlx::query(
            r#"
            UPDATE permissions
            SET name = $2, resource_type = $3, description = $4, deleted = $5
            WHERE id = $1
            "#,
        )
        .bind(permission.id.0)
        .bind(&permission.name)
        .bind(&permission.resource_type)
        .bind(&permission.description)
        .bind(permission.deleted)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "Permission {} not found",
                permission.id
            )));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &PermissionId) -> AppResult<Option<Permission>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let row = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {} FROM permissions p WHERE p.id = $1",
            PERMISSION_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Permission::from))
    }

    async fn exists_by_name(
        &self,
        name: &str,
        exclude: Option<&PermissionId>,
    ) -> AppResult<bool> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM permissions
                WHERE name = $1 AND NOT deleted AND ($2::UUID IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(name)
        .bind(exclude.map(|id| id.0))
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(exists)
    }

    async fn list(&self, filter: &CatalogFilter) -> AppResult<(Vec<PermissionSummary>, u64)> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let pattern = search_pattern(filter);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM permissions p
            WHERE ($1 OR NOT p.deleted) AND ($2::TEXT IS NULL OR p.name ILIKE $2)
            "#,
        )
        .bind(filter.include_deleted)
        .bind(&pattern)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, PermissionSummaryRow>(&format!(
            r#"
            SELECT {},
                   (SELECT COUNT(DISTINCT rp.role_id) FROM role_permissions rp
                    JOIN roles r ON r.id = rp.role_id AND NOT r.deleted
                    WHERE rp.permission_id = p.id AND NOT rp.deleted) AS role_count
            FROM permissions p
            WHERE ($1 OR NOT p.deleted) AND ($2::TEXT IS NULL OR p.name ILIKE $2)
            ORDER BY p.name, p.id
            LIMIT $3 OFFSET $4
            "#,
            PERMISSION_COLUMNS
        ))
        .bind(filter.include_deleted)
        .bind(&pattern)
        .bind(filter.pagination.limit() as i64)
        .bind(filter.pagination.offset() as i64)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok((
            rows.into_iter().map(PermissionSummary::from).collect(),
            total.max(0) as u64,
        ))
    }
}

#[async_trait]
impl RolePermissionRepository for TxRolePermissionRepository {
    async fn find_link(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AppResult<Option<RolePermissionLink>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT role_id, permission_id, deleted, created_at, created_by, updated_at, updated_by
            FROM role_permissions
            WHERE role_id = $1 AND permission_id = $2
            "#,
        )
        .bind(role_id.0)
        .bind(permission_id.0)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(RolePermissionLink::from))
    }

    async fn save_link(&self, link: &RolePermissionLink) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        sqlx::query(
            r#"
            INSERT INTO role_permissions
                (role_id, permission_id, deleted, created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (role_id, permission_id) DO UPDATE
            SET deleted = EXCLUDED.deleted,
                updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by
            "#,
        )
        .bind(link.role_id.0)
        .bind(link.permission_id.0)
        .bind(link.deleted)
        .bind(link.audit_info.created_at)
        .bind(link.audit_info.created_by.map(|a| a.0))
        .bind(link.audit_info.updated_at)
        .bind(link.audit_info.updated_by.map(|a| a.0))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn permissions_of_role(&self, role_id: &RoleId) -> AppResult<Vec<Permission>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let rows = sqlx::query_as::<_, PermissionRow>(&format!(
            r#"
            SELECT {}
            FROM permissions p
            INNER JOIN role_permissions rp ON p.id = rp.permission_id
            WHERE rp.role_id = $1 AND NOT rp.deleted AND NOT p.deleted
            ORDER BY p.name
            "#,
            PERMISSION_COLUMNS
        ))
        .bind(role_id.0)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Permission::from).collect())
    }
}

#[async_trait]
impl RoleAssignmentRepository for TxRoleAssignmentRepository {
    async fn find(
        &self,
        identity_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<Option<RoleAssignment>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let row = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT identity_id, role_id, is_primary, deleted,
                   created_at, created_by, updated_at, updated_by
            FROM role_assignments
            WHERE identity_id = $1 AND role_id = $2
            "#,
        )
        .bind(identity_id.0)
        .bind(role_id.0)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(RoleAssignment::from))
    }

    async fn save(&self, assignment: &RoleAssignment) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        sqlx::query(
            r#"
            INSERT INTO role_assignments
                (identity_id, role_id, is_primary, deleted, created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (identity_id, role_id) DO UPDATE
            SET is_primary = EXCLUDED.is_primary,
                deleted = EXCLUDED.deleted,
                updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by
            "#,
        )
        .bind(assignment.identity_id.0)
        .bind(assignment.role_id.0)
        .bind(assignment.is_primary)
        .bind(assignment.deleted)
        .bind(assignment.audit_info.created_at)
        .bind(assignment.audit_info.created_by.map(|a| a.0))
        .bind(assignment.audit_info.updated_at)
        .bind(assignment.audit_info.updated_by.map(|a| a.0))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn clear_primary(
        &self,
        identity_id: &IdentityId,
        except: &RoleId,
        actor: Option<ActorId>,
    ) -> AppResult<u64> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let result = sqlx::query(
            r#"
            UPDATE role_assignments
            SET is_primary = FALSE, updated_at = $4, updated_by = $3
            WHERE identity_id = $1 AND role_id <> $2 AND is_primary AND NOT deleted
            "#,
        )
        .bind(identity_id.0)
        .bind(except.0)
        .bind(actor.map(|a| a.0))
        .bind(Utc::now())
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn list_for_identity(
        &self,
        identity_id: &IdentityId,
        include_deleted: bool,
    ) -> AppResult<Vec<HeldRole>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let rows = sqlx::query_as::<_, HeldRoleRow>(
            r#"
            SELECT a.identity_id, a.role_id, a.is_primary, a.deleted,
                   a.created_at, a.created_by, a.updated_at, a.updated_by,
                   r.name AS role_name, r.note AS role_note, r.deleted AS role_deleted,
                   r.created_at AS role_created_at, r.created_by AS role_created_by,
                   r.updated_at AS role_updated_at, r.updated_by AS role_updated_by
            FROM role_assignments a
            INNER JOIN roles r ON r.id = a.role_id
            WHERE a.identity_id = $1 AND ($2 OR NOT a.deleted)
            ORDER BY a.created_at, a.role_id
            "#,
        )
        .bind(identity_id.0)
        .bind(include_deleted)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(HeldRole::from).collect())
    }

    async fn holders_of(&self, role_id: &RoleId) -> AppResult<Vec<IdentityId>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT identity_id
            FROM role_assignments
            WHERE role_id = $1 AND NOT deleted
            ORDER BY identity_id
            "#,
        )
        .bind(role_id.0)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(ids.into_iter().map(IdentityId).collect())
    }

    async fn effective_permissions(&self, identity_id: &IdentityId) -> AppResult<Vec<Permission>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let rows = sqlx::query_as::<_, PermissionRow>(&format!(
            r#"
            SELECT DISTINCT {}
            FROM role_assignments a
            INNER JOIN roles r ON r.id = a.role_id AND NOT r.deleted
            INNER JOIN role_permissions rp ON rp.role_id = r.id AND NOT rp.deleted
            INNER JOIN permissions p ON p.id = rp.permission_id AND NOT p.deleted
            WHERE a.identity_id = $1 AND NOT a.deleted
            ORDER BY p.name
            "#,
            PERMISSION_COLUMNS
        ))
        .bind(identity_id.0)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Permission::from).collect())
    }
}

#[async_trait]
impl IdentityRepository for TxIdentityRepository {
    async fn find_by_id(&self, id: &IdentityId) -> AppResult<Option<Identity>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, full_name, email, phone, visible, created_at, created_by, updated_at, updated_by
            FROM identities
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Identity::from))
    }

    async fn save(&self, identity: &Identity) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        sqlx::query(
            r#"
            INSERT INTO identities
                (id, full_name, email, phone, visible, created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                visible = EXCLUDED.visible,
                updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by
            "#,
        )
        .bind(identity.id.0)
        .bind(&identity.contact.full_name)
        .bind(&identity.contact.email)
        .bind(&identity.contact.phone)
        .bind(identity.visible)
        .bind(identity.audit_info.created_at)
        .bind(identity.audit_info.created_by.map(|a| a.0))
        .bind(identity.audit_info.updated_at)
        .bind(identity.audit_info.updated_by.map(|a| a.0))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

/// 三张档案表合并查询，缺失列以 NULL 补齐
const PROFILE_UNION: &str = r#"
    SELECT 'practitioner'::TEXT AS kind, id, full_name, email, phone,
           license_number, specialty, NULL::BOOLEAN AS is_super_admin,
           NULL::VARCHAR AS registration_number,
           visible, created_at, created_by, updated_at, updated_by
    FROM practitioner_profiles WHERE id = $1
    UNION ALL
    SELECT 'administrator'::TEXT, id, full_name, email, phone,
           NULL::VARCHAR, NULL::VARCHAR, is_super_admin, NULL::VARCHAR,
           visible, created_at, created_by, updated_at, updated_by
    FROM administrator_profiles WHERE id = $1
    UNION ALL
    SELECT 'organization'::TEXT, id, full_name, email, phone,
           NULL::VARCHAR, NULL::VARCHAR, NULL::BOOLEAN, registration_number,
           visible, created_at, created_by, updated_at, updated_by
    FROM organization_profiles WHERE id = $1
"#;

#[async_trait]
impl ProfileRepository for TxProfileRepository {
    async fn find(
        &self,
        id: &IdentityId,
        kind: ProfileKind,
    ) -> AppResult<Option<SpecializedProfile>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT * FROM ({}) profiles WHERE kind = $2",
            PROFILE_UNION
        ))
        .bind(id.0)
        .bind(kind.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ProfileRow::into_profile).transpose()
    }

    async fn list_for_identity(&self, id: &IdentityId) -> AppResult<Vec<SpecializedProfile>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let rows = sqlx::query_as::<_, ProfileRow>(PROFILE_UNION)
            .bind(id.0)
            .fetch_all(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(ProfileRow::into_profile).collect()
    }

    async fn save(&self, profile: &SpecializedProfile) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let query = match &profile.details {
            ProfileDetails::Practitioner {
                license_number,
                specialty,
            } => sqlx::query(
                r#"
                INSERT INTO practitioner_profiles
                    (id, full_name, email, phone, visible, created_at, created_by, updated_at, updated_by,
                     license_number, specialty)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (id) DO UPDATE
                SET full_name = EXCLUDED.full_name, email = EXCLUDED.email, phone = EXCLUDED.phone,
                    visible = EXCLUDED.visible, updated_at = EXCLUDED.updated_at,
                    updated_by = EXCLUDED.updated_by,
                    license_number = EXCLUDED.license_number, specialty = EXCLUDED.specialty
                "#,
            )
            .bind(profile.id.0)
            .bind(&profile.contact.full_name)
            .bind(&profile.contact.email)
            .bind(&profile.contact.phone)
            .bind(profile.visible)
            .bind(profile.audit_info.created_at)
            .bind(profile.audit_info.created_by.map(|a| a.0))
            .bind(profile.audit_info.updated_at)
            .bind(profile.audit_info.updated_by.map(|a| a.0))
            .bind(license_number)
            .bind(specialty),
            ProfileDetails::Administrator { is_super_admin } => sqlx::query(
                r#"
                INSERT INTO administrator_profiles
                    (id, full_name, email, phone, visible, created_at, created_by, updated_at, updated_by,
                     is_super_admin)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (id) DO UPDATE
                SET full_name = EXCLUDED.full_name, email = EXCLUDED.email, phone = EXCLUDED.phone,
                    visible = EXCLUDED.visible, updated_at = EXCLUDED.updated_at,
                    updated_by = EXCLUDED.updated_by,
                    is_super_admin = EXCLUDED.is_super_admin
                "#,
            )
            .bind(profile.id.0)
            .bind(&profile.contact.full_name)
            .bind(&profile.contact.email)
            .bind(&profile.contact.phone)
            .bind(profile.visible)
            .bind(profile.audit_info.created_at)
            .bind(profile.audit_info.created_by.map(|a| a.0))
            .bind(profile.audit_info.updated_at)
            .bind(profile.audit_info.updated_by.map(|a| a.0))
            .bind(*is_super_admin),
            ProfileDetails::Organization {
                registration_number,
            } => sqlx::query(
                r#"
                INSERT INTO organization_profiles
                    (id, full_name, email, phone, visible, created_at, created_by, updated_at, updated_by,
                     registration_number)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (id) DO UPDATE
                SET full_name = EXCLUDED.full_name, email = EXCLUDED.email, phone = EXCLUDED.phone,
                    visible = EXCLUDED.visible, updated_at = EXCLUDED.updated_at,
                    updated_by = EXCLUDED.updated_by,
                    registration_number = EXCLUDED.registration_number
                "#,
            )
            .bind(profile.id.0)
            .bind(&profile.contact.full_name)
            .bind(&profile.contact.email)
            .bind(&profile.contact.phone)
            .bind(profile.visible)
            .bind(profile.audit_info.created_at)
            .bind(profile.audit_info.created_by.map(|a| a.0))
            .bind(profile.audit_info.updated_at)
            .bind(profile.audit_info.updated_by.map(|a| a.0))
            .bind(registration_number),
        };

        query.execute(&mut **tx).await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
