//! 权威记录归位
//!
//! 根据账户当前持有的有效角色决定权威记录应在何处。撤销角色与目录变更
//! (改名、删除、恢复角色) 都通过这里让持有人的记录与其角色保持一致。

use clinic_common::{ActorId, IdentityId};
use clinic_errors::AppResult;

use super::locator::{RecordLocation, locate_authoritative_record};
use super::relocation::{Relocation, relocate_authoritative_record};
use crate::domain::archetype::{Archetype, ArchetypeRules};
use crate::domain::assignment::HeldRole;
use crate::domain::unit_of_work::UnitOfWork;

/// 当前档案仍有对应的有效角色时保持不动，否则回落到剩余的提升角色或账户
pub fn settle_location(
    rules: &ArchetypeRules,
    current: RecordLocation,
    held: &[HeldRole],
) -> RecordLocation {
    if let RecordLocation::Profile(kind) = current {
        let still_held = held
            .iter()
            .filter(|h| h.is_active())
            .any(|h| rules.resolve(&h.role.name).profile_kind() == Some(kind));
        if still_held {
            return current;
        }
    }
    fallback_location(rules, held)
}

/// 剩余提升角色中，主角色优先，其次最近更新的
pub fn fallback_location(rules: &ArchetypeRules, held: &[HeldRole]) -> RecordLocation {
    held.iter()
        .filter(|h| h.is_active())
        .filter_map(|h| {
            rules
                .resolve(&h.role.name)
                .profile_kind()
                .map(|kind| (h.assignment.is_primary, h.assignment.audit_info.updated_at, kind))
        })
        .max_by_key(|(is_primary, updated_at, _)| (*is_primary, *updated_at))
        .map(|(_, _, kind)| RecordLocation::Profile(kind))
        .unwrap_or(RecordLocation::Identity)
}

/// 是否持有任一有效的 super-admin 角色
pub fn holds_super_admin(rules: &ArchetypeRules, held: &[HeldRole]) -> bool {
    held.iter().filter(|h| h.is_active()).any(|h| {
        rules.resolve(&h.role.name) == Archetype::AdministratorFamily
            && rules.is_super_admin(&h.role.name)
    })
}

/// 按账户现有的有效角色重新安放权威记录
///
/// 调用方负责 `lock_identity`。账户与档案都不存在时返回 `None`。
pub async fn resettle_identity(
    uow: &dyn UnitOfWork,
    rules: &ArchetypeRules,
    identity_id: &IdentityId,
    actor: Option<ActorId>,
) -> AppResult<Option<RecordLocation>> {
    let Some(current) = locate_authoritative_record(uow, identity_id).await? else {
        return Ok(None);
    };
    let held = uow.assignments().list_for_identity(identity_id, false).await?;
    let location = relocate_authoritative_record(
        uow,
        Relocation {
            current: &current,
            target: settle_location(rules, current.location(), &held),
            super_admin: holds_super_admin(rules, &held),
            actor,
        },
    )
    .await?;
    Ok(Some(location))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::assignment::RoleAssignment;
    use crate::domain::catalog::Role;
    use crate::domain::profile::ProfileKind;

    fn held(name: &str, is_primary: bool) -> HeldRole {
        let role = Role::new(name.to_string(), None, None);
        HeldRole {
            assignment: RoleAssignment::new(IdentityId::new(), role.id, is_primary, None),
            role,
        }
    }

    #[test]
    fn test_current_profile_kept_while_held() {
        let rules = ArchetypeRules::default();
        let roles = vec![held("Doctor", false), held("Clinic", true)];
        assert_eq!(
            settle_location(
                &rules,
                RecordLocation::Profile(ProfileKind::Practitioner),
                &roles
            ),
            RecordLocation::Profile(ProfileKind::Practitioner)
        );
    }

    #[test]
    fn test_fallback_prefers_primary() {
        let rules = ArchetypeRules::default();
        let roles = vec![held("Doctor", true), held("Clinic", false)];
        assert_eq!(
            settle_location(&rules, RecordLocation::Identity, &roles),
            RecordLocation::Profile(ProfileKind::Practitioner)
        );
    }

    #[test]
    fn test_deleted_roles_do_not_count() {
        let rules = ArchetypeRules::default();
        let mut doctor = held("Doctor", true);
        doctor.role.mark_deleted(None);
        let roles = vec![doctor, held("Receptionist", false)];
        assert_eq!(
            settle_location(
                &rules,
                RecordLocation::Profile(ProfileKind::Practitioner),
                &roles
            ),
            RecordLocation::Identity
        );

        let mut super_admin = held("SuperAdmin", false);
        assert!(holds_super_admin(&rules, std::slice::from_ref(&super_admin)));
        super_admin.role.mark_deleted(None);
        assert!(!holds_super_admin(&rules, &[super_admin]));
    }
}
