//! 角色/权限目录测试

mod common;

use clinic_common::Pagination;
use clinic_errors::{AppError, ErrorKind};
use common::Harness;
use role_access::application::catalog::{
    CreatePermissionCommand, CreateRoleCommand, DeletePermissionCommand, ListPermissionsQuery,
    ListRolesQuery, RoleLifecycleCommand, RolePermissionCommand, SearchRolesQuery,
    UpdatePermissionCommand, UpdateRoleCommand,
};
use role_access::domain::ProfileKind;
use role_access::domain::catalog::{LinkChange, PermissionId, Role, RoleId};
use role_access::infrastructure::persistence::FaultPoint;

fn create_role(name: &str) -> CreateRoleCommand {
    CreateRoleCommand {
        name: name.to_string(),
        note: None,
        performed_by: None,
    }
}

fn link(h: &Harness, role: &Role, permission_id: PermissionId) -> RolePermissionCommand {
    RolePermissionCommand {
        role_id: role.id,
        permission_id,
        performed_by: Some(h.actor),
    }
}

// ============ 角色 ============

#[tokio::test]
async fn test_create_role_trims_and_audits() {
    let h = Harness::new();
    let role = h
        .services
        .catalog
        .create_role(CreateRoleCommand {
            name: "  Nurse  ".to_string(),
            note: Some("Ward staff".to_string()),
            performed_by: Some(h.actor),
        })
        .await
        .unwrap();

    assert_eq!(role.name, "Nurse");
    assert_eq!(role.note.as_deref(), Some("Ward staff"));
    assert_eq!(role.audit_info.created_by, Some(h.actor));
    assert_eq!(h.audit.actions().await, vec!["role.created"]);
}

#[tokio::test]
async fn test_role_validation() {
    let h = Harness::new();

    let err = h.services.catalog.create_role(create_role("   ")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .services
        .catalog
        .create_role(create_role(&"x".repeat(101)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .services
        .catalog
        .create_role(CreateRoleCommand {
            name: "Nurse".to_string(),
            note: Some("n".repeat(1001)),
            performed_by: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.store.snapshot().await.roles.is_empty());
}

#[tokio::test]
async fn test_duplicate_role_name_is_conflict_ignoring_case() {
    let h = Harness::new();
    h.role("Nurse").await;

    let err = h.services.catalog.create_role(create_role("NURSE")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_deleted_role_name_can_be_reused() {
    let h = Harness::new();
    let old = h.role("Nurse").await;
    h.services
        .catalog
        .delete_role(RoleLifecycleCommand {
            role_id: old.id,
            performed_by: None,
        })
        .await
        .unwrap();

    let new = h.role("Nurse").await;
    assert_ne!(new.id, old.id);

    // 同名角色已存在时不能恢复旧角色
    let err = h
        .services
        .catalog
        .restore_role(RoleLifecycleCommand {
            role_id: old.id,
            performed_by: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_role_lifecycle_conflicts() {
    let h = Harness::new();
    let role = h.role("Nurse").await;
    let cmd = RoleLifecycleCommand {
        role_id: role.id,
        performed_by: None,
    };

    let err = h.services.catalog.restore_role(cmd.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let deleted = h.services.catalog.delete_role(cmd.clone()).await.unwrap();
    assert!(deleted.deleted);
    let err = h.services.catalog.delete_role(cmd.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let restored = h.services.catalog.restore_role(cmd).await.unwrap();
    assert!(!restored.deleted);
    assert_eq!(
        h.audit.actions().await,
        vec!["role.created", "role.deleted", "role.restored"]
    );
}

#[tokio::test]
async fn test_update_role() {
    let h = Harness::new();
    let nurse = h.role("Nurse").await;
    h.role("Doctor").await;

    let updated = h
        .services
        .catalog
        .update_role(UpdateRoleCommand {
            role_id: nurse.id,
            name: "Head Nurse".to_string(),
            note: Some("Ward lead".to_string()),
            performed_by: None,
        })
        .await
        .unwrap();
    assert_eq!(updated.name, "Head Nurse");

    let err = h
        .services
        .catalog
        .update_role(UpdateRoleCommand {
            role_id: nurse.id,
            name: "doctor".to_string(),
            note: None,
            performed_by: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // 只改备注，名称与自身相同
    h.services
        .catalog
        .update_role(UpdateRoleCommand {
            role_id: nurse.id,
            name: "Head Nurse".to_string(),
            note: None,
            performed_by: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_and_search_roles_with_holder_counts() {
    let h = Harness::new();
    let nurse = h.role("Nurse").await;
    let night = h.role("Night Nurse").await;
    let doctor = h.role("Doctor").await;
    let a = h.identity("Holder A").await;
    let b = h.identity("Holder B").await;
    h.assign(a, nurse.id).await;
    h.assign(b, nurse.id).await;
    h.assign(a, doctor.id).await;
    h.services
        .assignments
        .revoke_role(h.revoke_cmd(a, doctor.id))
        .await
        .unwrap();
    h.services
        .catalog
        .delete_role(RoleLifecycleCommand {
            role_id: night.id,
            performed_by: None,
        })
        .await
        .unwrap();

    let page = h
        .services
        .catalog_queries
        .list_roles(ListRolesQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    let counts: Vec<_> = page
        .items
        .iter()
        .map(|s| (s.role.name.as_str(), s.holder_count))
        .collect();
    assert_eq!(counts, vec![("Doctor", 0), ("Nurse", 2)]);

    let all = h
        .services
        .catalog_queries
        .list_roles(ListRolesQuery {
            pagination: Pagination::new(1, 2),
            include_deleted: true,
        })
        .await
        .unwrap();
    assert_eq!(all.total, 3);
    assert_eq!(all.items.len(), 2);
    assert_eq!(all.total_pages(), 2);

    let found = h
        .services
        .catalog_queries
        .search_roles(SearchRolesQuery {
            query: "nurse".to_string(),
            pagination: Pagination::default(),
        })
        .await
        .unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.items[0].role.id, nurse.id);

    let err = h
        .services
        .catalog_queries
        .search_roles(SearchRolesQuery {
            query: " ".to_string(),
            pagination: Pagination::default(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_role_lookup_by_name_ignores_deleted() {
    let h = Harness::new();
    let nurse = h.role("Nurse").await;

    let found = h.services.catalog_queries.get_role_by_name("nurse").await.unwrap();
    assert_eq!(found.id, nurse.id);

    h.services
        .catalog
        .delete_role(RoleLifecycleCommand {
            role_id: nurse.id,
            performed_by: None,
        })
        .await
        .unwrap();
    let err = h
        .services
        .catalog_queries
        .get_role_by_name("Nurse")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    // 按 ID 仍可查到已删除的角色
    assert!(h.services.catalog_queries.get_role(&nurse.id).await.unwrap().deleted);
}

// ============ 权限 ============

#[tokio::test]
async fn test_permission_crud() {
    let h = Harness::new();
    let permission = h.permission("patients.read").await;

    let err = h
        .services
        .catalog
        .create_permission(CreatePermissionCommand {
            name: "patients.read".to_string(),
            resource_type: "patient".to_string(),
            description: None,
            performed_by: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let updated = h
        .services
        .catalog
        .update_permission(UpdatePermissionCommand {
            permission_id: permission.id,
            name: "patients.view".to_string(),
            resource_type: "patient".to_string(),
            description: Some("View patient charts".to_string()),
            performed_by: None,
        })
        .await
        .unwrap();
    assert_eq!(updated.name, "patients.view");
    assert_eq!(updated.resource_type, "patient");

    let deleted = h
        .services
        .catalog
        .delete_permission(DeletePermissionCommand {
            permission_id: permission.id,
            performed_by: None,
        })
        .await
        .unwrap();
    assert!(deleted.deleted);

    let err = h
        .services
        .catalog
        .delete_permission(DeletePermissionCommand {
            permission_id: permission.id,
            performed_by: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = h
        .services
        .catalog_queries
        .get_permission(&PermissionId::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_list_permissions_with_role_counts() {
    let h = Harness::new();
    let read = h.permission("patients.read").await;
    let write = h.permission("patients.write").await;
    h.permission("billing.view").await;
    h.role_with("Doctor", &[&read, &write]).await;
    let nurse = h.role_with("Nurse", &[&read]).await;
    h.services
        .catalog
        .delete_role(RoleLifecycleCommand {
            role_id: nurse.id,
            performed_by: None,
        })
        .await
        .unwrap();

    let page = h
        .services
        .catalog_queries
        .list_permissions(ListPermissionsQuery {
            search: Some("PATIENTS".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    let counts: Vec<_> = page
        .items
        .iter()
        .map(|s| (s.permission.name.as_str(), s.role_count))
        .collect();
    assert_eq!(counts, vec![("patients.read", 1), ("patients.write", 1)]);
}

// ============ 关联 ============

#[tokio::test]
async fn test_link_unlink_round_trip() {
    let h = Harness::new();
    let read = h.permission("patients.read").await;
    let doctor = h.role("Doctor").await;

    let first = h.services.catalog.link_permission(link(&h, &doctor, read.id)).await.unwrap();
    assert_eq!(first.change, LinkChange::Inserted);

    let again = h.services.catalog.link_permission(link(&h, &doctor, read.id)).await.unwrap();
    assert_eq!(again.change, LinkChange::Unchanged);

    let unlinked = h
        .services
        .catalog
        .unlink_permission(link(&h, &doctor, read.id))
        .await
        .unwrap();
    assert!(unlinked.deleted);
    assert!(
        h.services
            .catalog_queries
            .role_permissions(&doctor.id)
            .await
            .unwrap()
            .is_empty()
    );

    let err = h
        .services
        .catalog
        .unlink_permission(link(&h, &doctor, read.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let restored = h.services.catalog.link_permission(link(&h, &doctor, read.id)).await.unwrap();
    assert_eq!(restored.change, LinkChange::Restored);
    assert_eq!(restored.link.audit_info.created_at, first.link.audit_info.created_at);

    let permissions = h.services.catalog_queries.role_permissions(&doctor.id).await.unwrap();
    assert_eq!(permissions.len(), 1);
    assert_eq!(permissions[0].id, read.id);

    let linked: Vec<_> = h
        .audit
        .actions()
        .await
        .into_iter()
        .filter(|a| a.starts_with("role_permission."))
        .collect();
    assert_eq!(
        linked,
        vec![
            "role_permission.linked",
            "role_permission.unlinked",
            "role_permission.linked"
        ]
    );
}

#[tokio::test]
async fn test_link_errors() {
    let h = Harness::new();
    let read = h.permission("patients.read").await;
    let doctor = h.role("Doctor").await;

    let err = h
        .services
        .catalog
        .unlink_permission(link(&h, &doctor, read.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h
        .services
        .catalog
        .link_permission(link(&h, &doctor, PermissionId::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h
        .services
        .catalog_queries
        .role_permissions(&RoleId::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

fn rename(role: &Role, name: &str) -> UpdateRoleCommand {
    UpdateRoleCommand {
        role_id: role.id,
        name: name.to_string(),
        note: None,
        performed_by: None,
    }
}

fn lifecycle(role: &Role) -> RoleLifecycleCommand {
    RoleLifecycleCommand {
        role_id: role.id,
        performed_by: None,
    }
}

#[tokio::test]
async fn test_renaming_held_role_moves_holder_records() {
    let h = Harness::new();
    let desk = h.role("Receptionist").await;
    let id = h.identity("Renamed Holder").await;
    h.assign(id, desk.id).await;
    assert_eq!(h.visible_records(id).await, vec!["identity"]);

    h.services.catalog.update_role(rename(&desk, "Doctor")).await.unwrap();
    assert_eq!(h.visible_records(id).await, vec!["practitioner_profile"]);
    let state = h.store.snapshot().await;
    assert_eq!(
        state.profiles[&(id, ProfileKind::Practitioner)].contact.full_name,
        "Renamed Holder"
    );

    h.services.catalog.update_role(rename(&desk, "Front Desk")).await.unwrap();
    assert_eq!(h.visible_records(id).await, vec!["identity"]);

    // 名称变化但原型不变时不触碰档案
    let before = h.store.snapshot().await;
    h.services.catalog.update_role(rename(&desk, "Front-Desk Clerk")).await.unwrap();
    let after = h.store.snapshot().await;
    assert_eq!(after.identities, before.identities);
    assert_eq!(after.profiles, before.profiles);
}

#[tokio::test]
async fn test_renaming_admin_to_super_admin_sets_flag() {
    let h = Harness::new();
    let admin = h.role("Admin").await;
    let id = h.identity("Promoted").await;
    h.assign(id, admin.id).await;
    let state = h.store.snapshot().await;
    assert!(!state.profiles[&(id, ProfileKind::Administrator)].details.is_super_admin());

    h.services.catalog.update_role(rename(&admin, "Super Admin")).await.unwrap();

    let state = h.store.snapshot().await;
    let profile = &state.profiles[&(id, ProfileKind::Administrator)];
    assert!(profile.visible);
    assert!(profile.details.is_super_admin());
}

#[tokio::test]
async fn test_deleting_and_restoring_held_role_moves_holder_records() {
    let h = Harness::new();
    let doctor = h.role("Doctor").await;
    let desk = h.role("Receptionist").await;
    let id = h.identity("Lapsed Doctor").await;
    h.assign_primary(id, doctor.id).await;

    h.services.catalog.delete_role(lifecycle(&doctor)).await.unwrap();
    assert_eq!(h.visible_records(id).await, vec!["identity"]);

    h.assign(id, desk.id).await;
    assert_eq!(h.visible_records(id).await, vec!["identity"]);

    h.services.catalog.restore_role(lifecycle(&doctor)).await.unwrap();
    let held: Vec<_> = h
        .services
        .assignments
        .assignments_for(&id, false)
        .await
        .unwrap()
        .into_iter()
        .map(|held| held.role.name)
        .collect();
    assert_eq!(held, vec!["Doctor", "Receptionist"]);
    assert_eq!(h.visible_records(id).await, vec!["practitioner_profile"]);
    assert_eq!(
        h.services.assignments.authoritative_record(&id).await.unwrap().contact().full_name,
        "Lapsed Doctor"
    );
}

#[tokio::test]
async fn test_deleting_held_role_falls_back_to_other_elevation() {
    let h = Harness::new();
    let doctor = h.role("Doctor").await;
    let clinic = h.role("Clinic").await;
    let id = h.identity("Two Hats").await;
    h.assign(id, clinic.id).await;
    h.assign(id, doctor.id).await;
    assert_eq!(h.visible_records(id).await, vec!["practitioner_profile"]);

    h.services.catalog.delete_role(lifecycle(&doctor)).await.unwrap();
    assert_eq!(h.visible_records(id).await, vec!["organization_profile"]);

    // 恢复不算新的提升，当前档案仍有对应角色时保持不动
    h.services.catalog.restore_role(lifecycle(&doctor)).await.unwrap();
    assert_eq!(h.visible_records(id).await, vec!["organization_profile"]);
}

#[tokio::test]
async fn test_failed_resettle_rolls_back_role_delete() {
    let h = Harness::new();
    let doctor = h.role("Doctor").await;
    let id = h.identity("Rolled Back").await;
    h.assign(id, doctor.id).await;
    let before = h.store.snapshot().await;

    h.store.inject_fault(FaultPoint::SaveIdentity).await;
    let err = h
        .services
        .catalog
        .delete_role(lifecycle(&doctor))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::TransactionFailure(_)));
    assert_eq!(h.store.snapshot().await, before);
    assert!(!h.store.snapshot().await.roles[&doctor.id].deleted);
}
