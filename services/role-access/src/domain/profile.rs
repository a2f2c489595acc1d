//! 专属档案 (Practitioner / Administrator / Organization)

use clinic_common::{ActorId, AuditInfo, IdentityId};
use serde::{Deserialize, Serialize};

use super::identity::ContactInfo;

/// 档案种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Practitioner,
    Administrator,
    Organization,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 3] = [
        ProfileKind::Practitioner,
        ProfileKind::Administrator,
        ProfileKind::Organization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Practitioner => "practitioner",
            ProfileKind::Administrator => "administrator",
            ProfileKind::Organization => "organization",
        }
    }
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "practitioner" => Ok(ProfileKind::Practitioner),
            "administrator" => Ok(ProfileKind::Administrator),
            "organization" => Ok(ProfileKind::Organization),
            other => Err(format!("Unknown profile kind: {}", other)),
        }
    }
}

/// 各种类档案特有的字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfileDetails {
    Practitioner {
        license_number: Option<String>,
        specialty: Option<String>,
    },
    Administrator {
        is_super_admin: bool,
    },
    Organization {
        registration_number: Option<String>,
    },
}

impl ProfileDetails {
    /// 首次迁移时使用的空白详情
    pub fn empty(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Practitioner => ProfileDetails::Practitioner {
                license_number: None,
                specialty: None,
            },
            ProfileKind::Administrator => ProfileDetails::Administrator {
                is_super_admin: false,
            },
            ProfileKind::Organization => ProfileDetails::Organization {
                registration_number: None,
            },
        }
    }

    pub fn kind(&self) -> ProfileKind {
        match self {
            ProfileDetails::Practitioner { .. } => ProfileKind::Practitioner,
            ProfileDetails::Administrator { .. } => ProfileKind::Administrator,
            ProfileDetails::Organization { .. } => ProfileKind::Organization,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(
            self,
            ProfileDetails::Administrator {
                is_super_admin: true
            }
        )
    }
}

/// 专属档案，`id` 与账户 ID 相同
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecializedProfile {
    pub id: IdentityId,
    pub contact: ContactInfo,
    pub details: ProfileDetails,
    pub visible: bool,
    pub audit_info: AuditInfo,
}

impl SpecializedProfile {
    pub fn new(
        id: IdentityId,
        contact: ContactInfo,
        details: ProfileDetails,
        actor: Option<ActorId>,
    ) -> Self {
        Self {
            id,
            contact,
            details,
            visible: true,
            audit_info: AuditInfo::new(actor),
        }
    }

    pub fn kind(&self) -> ProfileKind {
        self.details.kind()
    }

    /// 重新启用档案并刷新联系方式
    ///
    /// 管理员的 super-admin 标记每次都会重算，其他种类保留已有详情。
    pub fn reactivate(
        &mut self,
        contact: ContactInfo,
        super_admin: Option<bool>,
        actor: Option<ActorId>,
    ) {
        self.contact = contact;
        if let (ProfileDetails::Administrator { is_super_admin }, Some(flag)) =
            (&mut self.details, super_admin)
        {
            *is_super_admin = flag;
        }
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
    fn test_empty_details_match_kind() {
        for kind in ProfileKind::ALL {
            assert_eq!(ProfileDetails::empty(kind).kind(), kind);
        }
    }

    #[test]
    fn test_reactivate_keeps_practitioner_details() {
        let mut profile = SpecializedProfile::new(
            IdentityId::new(),
            ContactInfo::new("Old Name"),
            ProfileDetails::Practitioner {
                license_number: Some("LIC-1".to_string()),
                specialty: Some("cardiology".to_string()),
            },
            None,
        );
        profile.hide(None);

        profile.reactivate(ContactInfo::new("New Name"), Some(true), None);

        assert!(profile.visible);
        assert_eq!(profile.contact.full_name, "New Name");
        assert_eq!(
            profile.details,
            ProfileDetails::Practitioner {
                license_number: Some("LIC-1".to_string()),
                specialty: Some("cardiology".to_string()),
            }
        );
    }

    #[test]
    fn test_reactivate_recomputes_super_admin_flag() {
        let mut profile = SpecializedProfile::new(
            IdentityId::new(),
            ContactInfo::new("Root"),
            ProfileDetails::Administrator {
                is_super_admin: false,
            },
            None,
        );
        profile.reactivate(ContactInfo::new("Root"), Some(true), None);
        assert!(profile.details.is_super_admin());

        profile.reactivate(ContactInfo::new("Root"), Some(false), None);
        assert!(!profile.details.is_super_admin());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(
            "administrator".parse::<ProfileKind>(),
            Ok(ProfileKind::Administrator)
        );
        assert!("nurse".parse::<ProfileKind>().is_err());
    }
}
