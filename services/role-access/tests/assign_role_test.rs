//! 角色分配测试

mod common;

use std::collections::BTreeSet;

use clinic_common::IdentityId;
use clinic_errors::{AppError, ErrorKind};
use common::Harness;
use role_access::application::AssignRoleCommand;
use role_access::application::catalog::RoleLifecycleCommand;
use role_access::domain::catalog::RoleId;
use role_access::domain::{Archetype, LedgerChange, ProfileKind, RecordLocation};
use role_access::infrastructure::InMemoryAuditSink;
use role_access::infrastructure::persistence::FaultPoint;

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ============ 迁移场景 ============

#[tokio::test]
async fn test_practitioner_assignment_moves_record_to_profile() {
    let h = Harness::new();
    let read = h.permission("patients.read").await;
    let write = h.permission("patients.write").await;
    let practitioner = h.role_with("Practitioner", &[&read, &write]).await;
    let u1 = h.identity("Ada Lovelace").await;

    let outcome = h.assign_primary(u1, practitioner.id).await;

    assert_eq!(outcome.archetype, Archetype::Practitioner);
    assert_eq!(outcome.ledger, LedgerChange::Inserted);
    assert!(outcome.is_primary);
    assert_eq!(
        outcome.authoritative,
        RecordLocation::Profile(ProfileKind::Practitioner)
    );

    let granted = h.services.permissions.effective_permissions(&u1).await.unwrap();
    assert_eq!(granted, names(&["patients.read", "patients.write"]));

    let state = h.store.snapshot().await;
    assert!(!state.identities[&u1].visible);
    let profile = &state.profiles[&(u1, ProfileKind::Practitioner)];
    assert!(profile.visible);
    assert_eq!(profile.contact, state.identities[&u1].contact);
    assert_eq!(h.visible_records(u1).await, vec!["practitioner_profile"]);
}

#[tokio::test]
async fn test_admin_then_super_admin_flips_flag_on_same_profile() {
    let h = Harness::new();
    let admin = h.role("Admin").await;
    let super_admin = h.role("SuperAdmin").await;
    let u2 = h.identity("Grace Hopper").await;

    let first = h.assign(u2, admin.id).await;
    assert_eq!(first.archetype, Archetype::AdministratorFamily);
    let state = h.store.snapshot().await;
    let profile = &state.profiles[&(u2, ProfileKind::Administrator)];
    assert!(!profile.details.is_super_admin());
    let created_at = profile.audit_info.created_at;

    let second = h.assign(u2, super_admin.id).await;
    assert_eq!(second.archetype, Archetype::AdministratorFamily);
    assert_eq!(
        second.authoritative,
        RecordLocation::Profile(ProfileKind::Administrator)
    );

    let state = h.store.snapshot().await;
    let profiles: Vec<_> = state.profiles.values().filter(|p| p.id == u2).collect();
    assert_eq!(profiles.len(), 1);
    assert!(profiles[0].details.is_super_admin());
    assert_eq!(profiles[0].audit_info.created_at, created_at);
    assert_eq!(h.visible_records(u2).await, vec!["administrator_profile"]);
}

#[tokio::test]
async fn test_role_names_match_loosely() {
    let h = Harness::new();
    let role = h.role("super_admin").await;
    let id = h.identity("Loose Match").await;

    let outcome = h.assign(id, role.id).await;
    assert_eq!(outcome.archetype, Archetype::AdministratorFamily);
    let state = h.store.snapshot().await;
    assert!(state.profiles[&(id, ProfileKind::Administrator)].details.is_super_admin());
}

#[tokio::test]
async fn test_organization_assignment_uses_organization_profile() {
    let h = Harness::new();
    let clinic = h.role("Clinic").await;
    let id = h.identity("Riverside Clinic").await;

    let outcome = h.assign(id, clinic.id).await;
    assert_eq!(outcome.archetype, Archetype::Organization);
    assert_eq!(h.visible_records(id).await, vec!["organization_profile"]);
}

#[tokio::test]
async fn test_latest_elevation_wins() {
    let h = Harness::new();
    let doctor = h.role("Doctor").await;
    let clinic = h.role("Clinic").await;
    let id = h.identity("Two Hats").await;

    h.assign(id, doctor.id).await;
    let outcome = h.assign(id, clinic.id).await;

    assert_eq!(
        outcome.authoritative,
        RecordLocation::Profile(ProfileKind::Organization)
    );
    let state = h.store.snapshot().await;
    assert!(!state.profiles[&(id, ProfileKind::Practitioner)].visible);
    assert_eq!(h.visible_records(id).await, vec!["organization_profile"]);
}

#[tokio::test]
async fn test_base_role_keeps_elevated_record() {
    let h = Harness::new();
    let doctor = h.role("Doctor").await;
    let patient = h.role("Patient").await;
    let id = h.identity("Doctor Patient").await;

    h.assign(id, doctor.id).await;
    let outcome = h.assign(id, patient.id).await;

    assert_eq!(outcome.archetype, Archetype::Base);
    assert_eq!(
        outcome.authoritative,
        RecordLocation::Profile(ProfileKind::Practitioner)
    );
    assert_eq!(h.visible_records(id).await, vec!["practitioner_profile"]);
}

#[tokio::test]
async fn test_other_role_on_plain_identity_stays_on_identity() {
    let h = Harness::new();
    let billing = h.role("Billing").await;
    let id = h.identity("Plain").await;

    let outcome = h.assign(id, billing.id).await;
    assert_eq!(outcome.archetype, Archetype::Other);
    assert_eq!(outcome.authoritative, RecordLocation::Identity);
    assert_eq!(h.visible_records(id).await, vec!["identity"]);
}

// ============ 台账 ============

#[tokio::test]
async fn test_reassignment_is_idempotent() {
    let h = Harness::new();
    let read = h.permission("schedule.read").await;
    let doctor = h.role_with("Doctor", &[&read]).await;
    let id = h.identity("Repeat").await;

    h.assign(id, doctor.id).await;
    let before = h.store.snapshot().await;
    let again = h.assign(id, doctor.id).await;

    assert_eq!(again.ledger, LedgerChange::Updated);
    let after = h.store.snapshot().await;
    assert_eq!(
        after.assignments.keys().collect::<Vec<_>>(),
        before.assignments.keys().collect::<Vec<_>>()
    );
    assert_eq!(after.profiles.len(), before.profiles.len());
    assert_eq!(h.visible_records(id).await, vec!["practitioner_profile"]);
    assert_eq!(
        h.services.permissions.effective_permissions(&id).await.unwrap(),
        names(&["schedule.read"])
    );
}

#[tokio::test]
async fn test_new_primary_clears_previous_primary() {
    let h = Harness::new();
    let user = h.role("User").await;
    let billing = h.role("Billing").await;
    let id = h.identity("Primary Swap").await;

    let first = h.assign_primary(id, user.id).await;
    assert_eq!(first.cleared_primary, 0);
    let second = h.assign_primary(id, billing.id).await;
    assert_eq!(second.cleared_primary, 1);

    let held = h.services.assignments.assignments_for(&id, false).await.unwrap();
    let primaries: Vec<_> = held
        .iter()
        .filter(|held| held.assignment.is_primary)
        .map(|held| held.role.name.as_str())
        .collect();
    assert_eq!(primaries, vec!["Billing"]);
}

#[tokio::test]
async fn test_non_primary_reassignment_drops_primary_flag() {
    let h = Harness::new();
    let user = h.role("User").await;
    let id = h.identity("Flag Drop").await;

    h.assign_primary(id, user.id).await;
    let outcome = h.assign(id, user.id).await;
    assert!(!outcome.is_primary);

    let state = h.store.snapshot().await;
    assert!(!state.assignments[&(id, user.id)].is_primary);
}

// ============ 错误 ============

#[tokio::test]
async fn test_unknown_role_is_not_found() {
    let h = Harness::new();
    let id = h.identity("Nobody").await;

    let err = h
        .services
        .assignments
        .assign_role(AssignRoleCommand::new(id, RoleId::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_deleted_role_cannot_be_assigned() {
    let h = Harness::new();
    let doctor = h.role("Doctor").await;
    h.services
        .catalog
        .delete_role(RoleLifecycleCommand {
            role_id: doctor.id,
            performed_by: None,
        })
        .await
        .unwrap();
    let id = h.identity("Late").await;

    let err = h
        .services
        .assignments
        .assign_role(AssignRoleCommand::new(id, doctor.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(h.visible_records(id).await, vec!["identity"]);
}

#[tokio::test]
async fn test_unknown_identity_is_not_found_and_writes_nothing() {
    let h = Harness::new();
    let doctor = h.role("Doctor").await;
    let before = h.store.snapshot().await;

    let err = h
        .services
        .assignments
        .assign_role(AssignRoleCommand::new(IdentityId::new(), doctor.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(h.store.snapshot().await, before);
}

// ============ 原子性 ============

async fn assert_fault_rolls_back(point: FaultPoint) {
    let h = Harness::new();
    let doctor = h.role("Doctor").await;
    let id = h.identity("Atomic").await;
    let before = h.store.snapshot().await;

    h.store.inject_fault(point).await;
    let err = h
        .services
        .assignments
        .assign_role(AssignRoleCommand::new(id, doctor.id).primary())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::TransactionFailure(_)), "{:?}", err);
    assert_eq!(h.store.snapshot().await, before, "fault at {:?}", point);

    // 故障只触发一次，重试成功
    h.assign_primary(id, doctor.id).await;
    assert_eq!(h.visible_records(id).await, vec!["practitioner_profile"]);
}

#[tokio::test]
async fn test_fault_during_relocation_rolls_back_ledger() {
    assert_fault_rolls_back(FaultPoint::SaveProfile).await;
    assert_fault_rolls_back(FaultPoint::SaveIdentity).await;
}

#[tokio::test]
async fn test_fault_in_ledger_or_commit_rolls_back() {
    assert_fault_rolls_back(FaultPoint::ClearPrimary).await;
    assert_fault_rolls_back(FaultPoint::SaveAssignment).await;
    assert_fault_rolls_back(FaultPoint::Commit).await;
}

// ============ 审计 ============

#[tokio::test]
async fn test_assignment_is_audited_after_commit() {
    let h = Harness::new();
    let doctor = h.role("Doctor").await;
    let id = h.identity("Audited").await;

    h.assign(id, doctor.id).await;

    let entries = h.audit.entries().await;
    let entry = entries
        .iter()
        .find(|e| e.action == "role.assigned")
        .expect("assignment audited");
    assert_eq!(entry.resource_type, "role_assignment");
    assert_eq!(entry.resource_id, format!("{}:{}", id, doctor.id));
    assert_eq!(entry.actor_id, Some(h.actor));
    assert!(entry.old_value.is_none());
    assert!(entry.new_value.is_some());
}

#[tokio::test]
async fn test_audit_failure_does_not_roll_back() {
    let h = Harness::with_audit(InMemoryAuditSink::failing());
    let doctor = h.role("Doctor").await;
    let id = h.identity("Unaudited").await;

    let outcome = h.assign(id, doctor.id).await;
    assert_eq!(outcome.ledger, LedgerChange::Inserted);
    assert!(h.audit.entries().await.is_empty());
    assert_eq!(h.visible_records(id).await, vec!["practitioner_profile"]);
}

// ============ 并发 ============

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_primary_assignments_leave_one_primary() {
    let h = std::sync::Arc::new(Harness::new());
    let id = h.identity("Contended").await;
    let mut roles = Vec::new();
    for n in 0..8 {
        roles.push(h.role(&format!("Desk {}", n)).await);
    }

    let tasks: Vec<_> = roles
        .iter()
        .map(|role| {
            let h = h.clone();
            let role_id = role.id;
            tokio::spawn(async move {
                h.services
                    .assignments
                    .assign_role(AssignRoleCommand::new(id, role_id).primary())
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("task joined").expect("assignment succeeded");
    }

    let state = h.store.snapshot().await;
    let primaries = state
        .assignments
        .values()
        .filter(|a| a.identity_id == id && a.is_primary && !a.deleted)
        .count();
    assert_eq!(primaries, 1);
    assert_eq!(state.assignments.len(), roles.len());
}
