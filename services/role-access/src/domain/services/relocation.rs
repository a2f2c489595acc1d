//! 权威记录迁移
//!
//! 所有原型共用同一个迁移操作：目标记录可见，其余记录隐藏。重复执行结果不变。

use clinic_common::ActorId;
use clinic_errors::AppResult;
use tracing::debug;

use super::locator::{AuthoritativeRecord, RecordLocation};
use crate::domain::identity::Identity;
use crate::domain::profile::{ProfileDetails, ProfileKind, SpecializedProfile};
use crate::domain::unit_of_work::UnitOfWork;

/// 迁移请求
#[derive(Debug, Clone)]
pub struct Relocation<'a> {
    /// 迁移前的权威记录，提供联系方式
    pub current: &'a AuthoritativeRecord,
    pub target: RecordLocation,
    /// 目标为管理员档案时写入的 super-admin 标记
    pub super_admin: bool,
    pub actor: Option<ActorId>,
}

/// 将权威记录迁移到目标位置
///
/// 档案目标：有则恢复并刷新联系方式 (详情保留)，无则新建；其他档案与账户隐藏。
/// 账户目标：账户可见，所有档案隐藏；账户行不存在时用当前联系方式重建。
pub async fn relocate_authoritative_record(
    uow: &dyn UnitOfWork,
    relocation: Relocation<'_>,
) -> AppResult<RecordLocation> {
    let id = relocation.current.id();
    let actor = relocation.actor;
    let profiles = uow.profiles().list_for_identity(&id).await?;

    match relocation.target {
        RecordLocation::Profile(kind) => {
            let existing = profiles.iter().find(|p| p.kind() == kind).cloned();
            // 账户可见时以账户为准，否则沿用目标档案，最后才取当前记录
            let contact = match (relocation.current, &existing) {
                (AuthoritativeRecord::Identity(identity), _) => identity.contact.clone(),
                (_, Some(profile)) => profile.contact.clone(),
                (current, None) => current.contact().clone(),
            };
            let super_admin = (kind == ProfileKind::Administrator).then_some(relocation.super_admin);

            let profile = match existing {
                Some(mut profile) => {
                    profile.reactivate(contact, super_admin, actor);
                    profile
                }
                None => {
                    let details = match kind {
                        ProfileKind::Administrator => ProfileDetails::Administrator {
                            is_super_admin: relocation.super_admin,
                        },
                        other => ProfileDetails::empty(other),
                    };
                    SpecializedProfile::new(id, contact, details, actor)
                }
            };
            uow.profiles().save(&profile).await?;

            for mut other in profiles.into_iter().filter(|p| p.kind() != kind && p.visible) {
                other.hide(actor);
                uow.profiles().save(&other).await?;
            }

            if let Some(mut identity) = uow.identities().find_by_id(&id).await? {
                if identity.visible {
                    identity.hide(actor);
                    uow.identities().save(&identity).await?;
                }
            }
        }
        RecordLocation::Identity => {
            match uow.identities().find_by_id(&id).await? {
                Some(mut identity) => {
                    if !identity.visible {
                        identity.show(actor);
                        uow.identities().save(&identity).await?;
                    }
                }
                None => {
                    let identity =
                        Identity::new(id, relocation.current.contact().clone(), actor);
                    uow.identities().save(&identity).await?;
                }
            }

            for mut profile in profiles.into_iter().filter(|p| p.visible) {
                profile.hide(actor);
                uow.profiles().save(&profile).await?;
            }
        }
    }

    debug!(identity_id = %id, target = %relocation.target, "Authoritative record relocated");
    Ok(relocation.target)
}
