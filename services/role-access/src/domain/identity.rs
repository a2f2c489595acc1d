//! 账户 (Identity) 实体

use clinic_common::{ActorId, AuditInfo, IdentityId};
use serde::{Deserialize, Serialize};

/// 联系方式，迁移时在账户与档案之间整体复制
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactInfo {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            email: None,
            phone: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// 通用账户记录
///
/// `visible = false` 表示该人的权威记录已迁移到某个专属档案。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub contact: ContactInfo,
    pub visible: bool,
    pub audit_info: AuditInfo,
}

impl Identity {
    pub fn new(id: IdentityId, contact: ContactInfo, actor: Option<ActorId>) -> Self {
        Self {
            id,
            contact,
            visible: true,
            audit_info: AuditInfo::new(actor),
        }
    }

    pub fn show(&mut self, actor: Option<ActorId>) {
        self.visible = true;
        self.audit_info.touch(actor);
    }

    pub fn hide(&mut self, actor: Option<ActorId>) {
        self.visible = false;
        self.audit_info.touch(actor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_identity_is_visible() {
        let identity = Identity::new(
            IdentityId::new(),
            ContactInfo::new("Ada Lovelace").with_email("ada@clinic.local"),
            None,
        );
        assert!(identity.visible);
        assert_eq!(identity.contact.email.as_deref(), Some("ada@clinic.local"));
    }

    #[test]
    fn test_hide_and_show() {
        let mut identity = Identity::new(IdentityId::new(), ContactInfo::new("A"), None);
        identity.hide(None);
        assert!(!identity.visible);
        identity.show(None);
        assert!(identity.visible);
    }
}
