//! 集成测试公共装置

#![allow(dead_code)]

use std::sync::Arc;

use clinic_common::{ActorId, IdentityId};
use role_access::application::catalog::{
    CreatePermissionCommand, CreateRoleCommand, RolePermissionCommand,
};
use role_access::application::{AssignRoleCommand, AssignmentOutcome, RevokeRoleCommand};
use role_access::domain::catalog::{Permission, Role, RoleId};
use role_access::domain::{ContactInfo, Identity};
use role_access::infrastructure::InMemoryAuditSink;
use role_access::infrastructure::persistence::InMemoryStore;
use role_access::{AccessConfig, AccessServices};
use uuid::Uuid;

pub struct Harness {
    pub store: InMemoryStore,
    pub audit: Arc<InMemoryAuditSink>,
    pub services: AccessServices,
    pub actor: ActorId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_audit(InMemoryAuditSink::new())
    }

    pub fn with_audit(audit: InMemoryAuditSink) -> Self {
        let store = InMemoryStore::new();
        let audit = Arc::new(audit);
        let services = AccessServices::with_audit_sink(
            Arc::new(store.clone()),
            &AccessConfig::default(),
            audit.clone(),
        );
        Self {
            store,
            audit,
            services,
            actor: ActorId::from_uuid(Uuid::now_v7()),
        }
    }

    /// 新建一个只有账户记录的人
    pub async fn identity(&self, name: &str) -> IdentityId {
        let id = IdentityId::new();
        let contact = ContactInfo::new(name).with_email(format!(
            "{}@clinic.local",
            name.to_lowercase().replace(' ', ".")
        ));
        self.store
            .insert_identity(Identity::new(id, contact, None))
            .await;
        id
    }

    pub async fn role(&self, name: &str) -> Role {
        self.services
            .catalog
            .create_role(CreateRoleCommand {
                name: name.to_string(),
                note: None,
                performed_by: Some(self.actor),
            })
            .await
            .expect("role created")
    }

    pub async fn permission(&self, name: &str) -> Permission {
        self.services
            .catalog
            .create_permission(CreatePermissionCommand {
                name: name.to_string(),
                resource_type: "clinic".to_string(),
                description: None,
                performed_by: Some(self.actor),
            })
            .await
            .expect("permission created")
    }

    /// 新建角色并关联给定权限
    pub async fn role_with(&self, name: &str, permissions: &[&Permission]) -> Role {
        let role = self.role(name).await;
        for permission in permissions {
            self.services
                .catalog
                .link_permission(RolePermissionCommand {
                    role_id: role.id,
                    permission_id: permission.id,
                    performed_by: Some(self.actor),
                })
                .await
                .expect("permission linked");
        }
        role
    }

    pub async fn assign(&self, identity: IdentityId, role: RoleId) -> AssignmentOutcome {
        self.services
            .assignments
            .assign_role(AssignRoleCommand::new(identity, role).performed_by(self.actor))
            .await
            .expect("role assigned")
    }

    pub async fn assign_primary(&self, identity: IdentityId, role: RoleId) -> AssignmentOutcome {
        self.services
            .assignments
            .assign_role(
                AssignRoleCommand::new(identity, role)
                    .primary()
                    .performed_by(self.actor),
            )
            .await
            .expect("role assigned")
    }

    pub fn revoke_cmd(&self, identity: IdentityId, role: RoleId) -> RevokeRoleCommand {
        RevokeRoleCommand::new(identity, role).performed_by(self.actor)
    }

    pub async fn visible_records(&self, identity: IdentityId) -> Vec<String> {
        self.store.snapshot().await.visible_records(&identity)
    }
}
