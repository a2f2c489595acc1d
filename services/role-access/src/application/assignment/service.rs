//! 角色分配引擎
//!
//! 分配与撤销在一个 Unit of Work 内完成：台账写入与权威记录迁移要么全部生效，要么全部回滚。

use std::sync::Arc;

use clinic_common::IdentityId;
use clinic_errors::{AppError, AppResult};
use clinic_ports::{AuditEntry, AuditSink};
use tracing::{info, instrument};

use super::commands::{
    AssignRoleCommand, AssignmentOutcome, RevocationOutcome, RevokeRoleCommand,
};
use crate::application::audit::{AuditRecorder, audit_value};
use crate::application::transaction::complete;
use crate::domain::archetype::ArchetypeRules;
use crate::domain::assignment::{HeldRole, LedgerChange, RoleAssignment};
use crate::domain::services::{
    AuthoritativeRecord, RecordLocation, Relocation, holds_super_admin,
    locate_authoritative_record, relocate_authoritative_record, resettle_identity,
    settle_location,
};
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory};
use crate::infrastructure::metrics::{AccessMetrics, OperationTimer};

/// 角色分配服务
pub struct RoleAssignmentService {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
    rules: Arc<ArchetypeRules>,
    audit: AuditRecorder,
}

impl RoleAssignmentService {
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

    /// 分配角色
    #[instrument(
        skip(self, cmd),
        fields(identity_id = %cmd.identity_id, role_id = %cmd.role_id, is_primary = cmd.is_primary)
    )]
    pub async fn assign_role(&self, cmd: AssignRoleCommand) -> AppResult<AssignmentOutcome> {
        let timer = OperationTimer::new("assign_role");
        let uow = self
            .uow_factory
            .begin()
            .await
            .map_err(AppError::into_transaction_failure)?;
        let result = self.assign_in(uow.as_ref(), &cmd).await;
        let result = complete(uow, result, "assign_role").await;
        timer.finish();

        let (outcome, previous) = match result {
            Ok(done) => done,
            Err(e) => {
                AccessMetrics::record_assignment("unresolved", AccessMetrics::error_label(&e));
                return Err(e);
            }
        };

        AccessMetrics::record_assignment(outcome.archetype.as_str(), outcome.ledger.as_str());
        info!(
            archetype = outcome.archetype.as_str(),
            ledger = outcome.ledger.as_str(),
            authoritative = %outcome.authoritative,
            "Role assigned"
        );

        let mut entry = AuditEntry::new(
            cmd.performed_by,
            "role.assigned",
            "role_assignment",
            assignment_resource_id(&cmd.identity_id, &outcome.role_id.to_string()),
        )
        .with_new_value(audit_value(&outcome));
        if let Some(previous) = previous {
            entry = entry.with_old_value(audit_value(&previous));
        }
        self.audit.record(entry).await;

        Ok(outcome)
    }

    /// 撤销角色
    #[instrument(skip(self, cmd), fields(identity_id = %cmd.identity_id, role_id = %cmd.role_id))]
    pub async fn revoke_role(&self, cmd: RevokeRoleCommand) -> AppResult<RevocationOutcome> {
        let timer = OperationTimer::new("revoke_role");
        let uow = self
            .uow_factory
            .begin()
            .await
            .map_err(AppError::into_transaction_failure)?;
        let result = self.revoke_in(uow.as_ref(), &cmd).await;
        let result = complete(uow, result, "revoke_role").await;
        timer.finish();

        let (outcome, previous) = match result {
            Ok(done) => done,
            Err(e) => {
                AccessMetrics::record_revocation("unresolved", AccessMetrics::error_label(&e));
                return Err(e);
            }
        };

        AccessMetrics::record_revocation(outcome.archetype.as_str(), "revoked");
        info!(
            archetype = outcome.archetype.as_str(),
            authoritative = ?outcome.authoritative,
            "Role revoked"
        );

        let entry = AuditEntry::new(
            cmd.performed_by,
            "role.revoked",
            "role_assignment",
            assignment_resource_id(&cmd.identity_id, &outcome.role_id.to_string()),
        )
        .with_old_value(audit_value(&previous))
        .with_new_value(audit_value(&outcome));
        self.audit.record(entry).await;

        Ok(outcome)
    }

    /// 账户的台账行 (管理界面用)
    pub async fn assignments_for(
        &self,
        identity_id: &IdentityId,
        include_revoked: bool,
    ) -> AppResult<Vec<HeldRole>> {
        let uow = self.uow_factory.begin_read_only().await?;
        let result = uow
            .assignments()
            .list_for_identity(identity_id, include_revoked)
            .await;
        complete(uow, result, "assignments_for").await
    }

    /// 账户当前的权威记录
    pub async fn authoritative_record(
        &self,
        identity_id: &IdentityId,
    ) -> AppResult<AuthoritativeRecord> {
        let uow = self.uow_factory.begin_read_only().await?;
        let result = locate_authoritative_record(uow.as_ref(), identity_id)
            .await
            .and_then(|record| {
                record.ok_or_else(|| {
                    AppError::not_found(format!("Identity {} not found", identity_id))
                })
            });
        complete(uow, result, "authoritative_record").await
    }

    async fn assign_in(
        &self,
        uow: &dyn UnitOfWork,
        cmd: &AssignRoleCommand,
    ) -> AppResult<(AssignmentOutcome, Option<RoleAssignment>)> {
        uow.lock_identity(&cmd.identity_id).await?;

        let role = uow
            .roles()
            .find_by_id(&cmd.role_id)
            .await?
            .filter(|r| !r.deleted)
            .ok_or_else(|| AppError::not_found(format!("Role {} not found", cmd.role_id)))?;
        let archetype = self.rules.resolve(&role.name);

        let current = locate_authoritative_record(uow, &cmd.identity_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Identity {} not found", cmd.identity_id))
            })?;

        let cleared_primary = if cmd.is_primary {
            uow.assignments()
                .clear_primary(&cmd.identity_id, &cmd.role_id, cmd.performed_by)
                .await?
        } else {
            0
        };

        let previous = uow
            .assignments()
            .find(&cmd.identity_id, &cmd.role_id)
            .await?;
        let (assignment, ledger) = match previous.clone() {
            Some(mut existing) => {
                let change = existing.reassign(cmd.is_primary, cmd.performed_by);
                (existing, change)
            }
            None => (
                RoleAssignment::new(
                    cmd.identity_id,
                    cmd.role_id,
                    cmd.is_primary,
                    cmd.performed_by,
                ),
                LedgerChange::Inserted,
            ),
        };
        uow.assignments().save(&assignment).await?;

        let held = uow
            .assignments()
            .list_for_identity(&cmd.identity_id, false)
            .await?;
        // 最近一次提升优先；普通角色不会把仍持有提升角色的人降级
        let target = match archetype.profile_kind() {
            Some(kind) => RecordLocation::Profile(kind),
            None => settle_location(&self.rules, current.location(), &held),
        };
        let authoritative = relocate_authoritative_record(
            uow,
            Relocation {
                current: &current,
                target,
                super_admin: holds_super_admin(&self.rules, &held),
                actor: cmd.performed_by,
            },
        )
        .await?;

        Ok((
            AssignmentOutcome {
                identity_id: cmd.identity_id,
                role_id: role.id,
                role_name: role.name,
                archetype,
                ledger,
                is_primary: cmd.is_primary,
                cleared_primary,
                authoritative,
            },
            previous,
        ))
    }

    async fn revoke_in(
        &self,
        uow: &dyn UnitOfWork,
        cmd: &RevokeRoleCommand,
    ) -> AppResult<(RevocationOutcome, RoleAssignment)> {
        uow.lock_identity(&cmd.identity_id).await?;

        // 已删除的角色仍可撤销
        let role = uow
            .roles()
            .find_by_id(&cmd.role_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Role {} not found", cmd.role_id)))?;
        let archetype = self.rules.resolve(&role.name);

        let mut assignment = uow
            .assignments()
            .find(&cmd.identity_id, &cmd.role_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Identity {} has never been assigned role {}",
                    cmd.identity_id, cmd.role_id
                ))
            })?;
        if assignment.deleted {
            return Err(AppError::conflict(format!(
                "Role {} is already revoked from identity {}",
                cmd.role_id, cmd.identity_id
            )));
        }

        let previous = assignment.clone();
        assignment.revoke(cmd.performed_by);
        uow.assignments().save(&assignment).await?;

        let authoritative = if archetype.is_elevated() {
            let location = resettle_identity(uow, &self.rules, &cmd.identity_id, cmd.performed_by)
                .await?
                .ok_or_else(|| {
                    AppError::not_found(format!("Identity {} not found", cmd.identity_id))
                })?;
            Some(location)
        } else {
            locate_authoritative_record(uow, &cmd.identity_id)
                .await?
                .map(|record| record.location())
        };

        Ok((
            RevocationOutcome {
                identity_id: cmd.identity_id,
                role_id: role.id,
                role_name: role.name,
                archetype,
                was_primary: previous.is_primary,
                authoritative,
            },
            previous,
        ))
    }
}

fn assignment_resource_id(identity_id: &IdentityId, role_id: &str) -> String {
    format!("{}:{}", identity_id, role_id)
}
