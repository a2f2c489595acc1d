//! 权威记录定位

use clinic_common::IdentityId;
use clinic_errors::AppResult;
use serde::{Deserialize, Serialize};

use crate::domain::identity::{ContactInfo, Identity};
use crate::domain::profile::{ProfileKind, SpecializedProfile};
use crate::domain::unit_of_work::UnitOfWork;

/// 权威记录所在的存储
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "store", content = "kind", rename_all = "snake_case")]
pub enum RecordLocation {
    Identity,
    Profile(ProfileKind),
}

impl std::fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordLocation::Identity => f.write_str("identity"),
            RecordLocation::Profile(kind) => write!(f, "{}_profile", kind),
        }
    }
}

/// 当前可见的权威记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "store", rename_all = "snake_case")]
pub enum AuthoritativeRecord {
    Identity(Identity),
    Profile(SpecializedProfile),
}

impl AuthoritativeRecord {
    pub fn location(&self) -> RecordLocation {
        match self {
            AuthoritativeRecord::Identity(_) => RecordLocation::Identity,
            AuthoritativeRecord::Profile(profile) => RecordLocation::Profile(profile.kind()),
        }
    }

    pub fn contact(&self) -> &ContactInfo {
        match self {
            AuthoritativeRecord::Identity(identity) => &identity.contact,
            AuthoritativeRecord::Profile(profile) => &profile.contact,
        }
    }

    pub fn id(&self) -> IdentityId {
        match self {
            AuthoritativeRecord::Identity(identity) => identity.id,
            AuthoritativeRecord::Profile(profile) => profile.id,
        }
    }
}

/// 查找账户当前的权威记录
///
/// 账户可见时就是账户本身，否则取可见的档案；多个档案同时可见时取最近更新的。
pub async fn locate_authoritative_record(
    uow: &dyn UnitOfWork,
    id: &IdentityId,
) -> AppResult<Option<AuthoritativeRecord>> {
    if let Some(identity) = uow.identities().find_by_id(id).await? {
        if identity.visible {
            return Ok(Some(AuthoritativeRecord::Identity(identity)));
        }
    }

    let profile = uow
        .profiles()
        .list_for_identity(id)
        .await?
        .into_iter()
        .filter(|p| p.visible)
        .max_by_key(|p| p.audit_info.updated_at);

    Ok(profile.map(AuthoritativeRecord::Profile))
}
