//! 内存 Unit of Work
//!
//! 事务开始时持有整个存储的锁并复制一份工作副本，提交时写回，丢弃即回滚。
//! 可在指定写入点注入一次性故障，用于验证原子性。

use async_trait::async_trait;
use chrono::Utc;
use clinic_common::{ActorId, IdentityId};
use clinic_errors::{AppError, AppResult};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::assignment::{HeldRole, RoleAssignment};
use crate::domain::catalog::{
    Permission, PermissionId, PermissionSummary, Role, RoleId, RolePermissionLink, RoleSummary,
};
use crate::domain::identity::Identity;
use crate::domain::profile::{ProfileKind, SpecializedProfile};
use crate::domain::repository::{
    CatalogFilter, IdentityRepository, PermissionRepository, ProfileRepository,
    RoleAssignmentRepository, RolePermissionRepository, RoleRepository,
};
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory};

/// 存储内容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryState {
    pub identities: BTreeMap<IdentityId, Identity>,
    pub roles: BTreeMap<RoleId, Role>,
    pub permissions: BTreeMap<PermissionId, Permission>,
    pub links: BTreeMap<(RoleId, PermissionId), RolePermissionLink>,
    pub assignments: BTreeMap<(IdentityId, RoleId), RoleAssignment>,
    pub profiles: BTreeMap<(IdentityId, ProfileKind), SpecializedProfile>,
}

impl MemoryState {
    /// 某账户所有可见记录的位置
    pub fn visible_records(&self, id: &IdentityId) -> Vec<String> {
        let mut visible = Vec::new();
        if self.identities.get(id).is_some_and(|i| i.visible) {
            visible.push("identity".to_string());
        }
        for kind in ProfileKind::ALL {
            if self.profiles.get(&(*id, kind)).is_some_and(|p| p.visible) {
                visible.push(format!("{}_profile", kind));
            }
        }
        visible
    }

    fn held_roles(&self, identity_id: &IdentityId, include_deleted: bool) -> Vec<HeldRole> {
        let mut held: Vec<HeldRole> = self
            .assignments
            .values()
            .filter(|a| a.identity_id == *identity_id && (include_deleted || !a.deleted))
            .filter_map(|a| {
                self.roles.get(&a.role_id).map(|role| HeldRole {
                    assignment: a.clone(),
                    role: role.clone(),
                })
            })
            .collect();
        held.sort_by(|a, b| {
            a.assignment
                .audit_info
                .created_at
                .cmp(&b.assignment.audit_info.created_at)
                .then(a.role.id.cmp(&b.role.id))
        });
        held
    }
}

/// 可注入故障的写入点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    ClearPrimary,
    SaveAssignment,
    SaveIdentity,
    SaveProfile,
    SaveLink,
    Commit,
}

/// 内存存储，同时充当 Unit of Work 工厂
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Mutex<HashSet<FaultPoint>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已提交状态的副本
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    pub async fn insert_identity(&self, identity: Identity) {
        self.state
            .lock()
            .await
            .identities
            .insert(identity.id, identity);
    }

    pub async fn insert_profile(&self, profile: SpecializedProfile) {
        self.state
            .lock()
            .await
            .profiles
            .insert((profile.id, profile.kind()), profile);
    }

    pub async fn insert_role(&self, role: Role) {
        self.state.lock().await.roles.insert(role.id, role);
    }

    /// 在写入点注入一次性故障，触发后自动清除
    pub async fn inject_fault(&self, point: FaultPoint) {
        self.faults.lock().await.insert(point);
    }

    async fn open(&self) -> Box<dyn UnitOfWork> {
        let committed = self.state.clone().lock_owned().await;
        let working = (*committed).clone();
        Box::new(InMemoryUnitOfWork {
            committed,
            repo: MemoryRepository {
                working: Arc::new(Mutex::new(working)),
                faults: self.faults.clone(),
            },
        })
    }
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        Ok(self.open().await)
    }

    async fn begin_read_only(&self) -> AppResult<Box<dyn UnitOfWork>> {
        Ok(self.open().await)
    }
}

/// 内存 Unit of Work，持有存储锁直到提交或丢弃
pub struct InMemoryUnitOfWork {
    committed: OwnedMutexGuard<MemoryState>,
    repo: MemoryRepository,
}

/// 工作副本上的仓储实现
struct MemoryRepository {
    working: Arc<Mutex<MemoryState>>,
    faults: Arc<Mutex<HashSet<FaultPoint>>>,
}

impl MemoryRepository {
    async fn check(&self, point: FaultPoint) -> AppResult<()> {
        if self.faults.lock().await.remove(&point) {
            return Err(AppError::database(format!("Injected fault at {:?}", point)));
        }
        Ok(())
    }
}

fn paginate<T>(items: Vec<T>, filter: &CatalogFilter) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let page = items
        .into_iter()
        .skip(filter.pagination.offset() as usize)
        .take(filter.pagination.limit() as usize)
        .collect();
    (page, total)
}

#[async_trait]
impl RoleRepository for MemoryRepository {
    async fn create(&self, role: &Role) -> AppResult<()> {
        let mut state = self.working.lock().await;
        let key = role.name.to_lowercase();
        if !role.deleted
            && state
                .roles
                .values()
                .any(|r| !r.deleted && r.name.to_lowercase() == key)
        {
            return Err(AppError::conflict("Role name already exists"));
        }
        state.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn update(&self, role: &Role) -> AppResult<()> {
        let mut state = self.working.lock().await;
        match state.roles.get_mut(&role.id) {
            Some(existing) => {
                *existing = role.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!("Role {} not found", role.id))),
        }
    }

    async fn find_by_id(&self, id: &RoleId) -> AppResult<Option<Role>> {
        Ok(self.working.lock().await.roles.get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let key = name.to_lowercase();
        Ok(self
            .working
            .lock()
            .await
            .roles
            .values()
            .find(|r| !r.deleted && r.name.to_lowercase() == key)
            .cloned())
    }

    async fn exists_by_name(&self, name: &str, exclude: Option<&RoleId>) -> AppResult<bool> {
        let key = name.to_lowercase();
        Ok(self.working.lock().await.roles.values().any(|r| {
            !r.deleted && r.name.to_lowercase() == key && Some(&r.id) != exclude
        }))
    }

    async fn list(&self, filter: &CatalogFilter) -> AppResult<(Vec<RoleSummary>, u64)> {
        let state = self.working.lock().await;
        let mut roles: Vec<&Role> = state
            .roles
            .values()
            .filter(|r| filter.matches(&r.name, r.deleted))
            .collect();
        roles.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });

        let summaries: Vec<RoleSummary> = roles
            .into_iter()
            .map(|role| {
                let holders: BTreeSet<IdentityId> = state
                    .assignments
                    .values()
                    .filter(|a| a.role_id == role.id && !a.deleted)
                    .map(|a| a.identity_id)
                    .collect();
                RoleSummary {
                    role: role.clone(),
                    holder_count: holders.len() as u64,
                }
            })
            .collect();

        Ok(paginate(summaries, filter))
    }
}

#[async_trait]
impl PermissionRepository for MemoryRepository {
    async fn create(&self, permission: &Permission) -> AppResult<()> {
        let mut state = self.working.lock().await;
        if !permission.deleted
            && state
                .permissions
                .values()
                .any(|p| !p.deleted && p.name == permission.name)
        {
            return Err(AppError::conflict("Permission name already exists"));
        }
        state.permissions.insert(permission.id, permission.clone());
        Ok(())
    }

    async fn update(&self, permission: &Permission) -> AppResult<()> {
        let mut state = self.working.lock().await;
        match state.permissions.get_mut(&permission.id) {
            Some(existing) => {
                *existing = permission.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!(
                "Permission {} not found",
                permission.id
            ))),
        }
    }

    async fn find_by_id(&self, id: &PermissionId) -> AppResult<Option<Permission>> {
        Ok(self.working.lock().await.permissions.get(id).cloned())
    }

    async fn exists_by_name(
        &self,
        name: &str,
        exclude: Option<&PermissionId>,
    ) -> AppResult<bool> {
        Ok(self
            .working
            .lock()
            .await
            .permissions
            .values()
            .any(|p| !p.deleted && p.name == name && Some(&p.id) != exclude))
    }

    async fn list(&self, filter: &CatalogFilter) -> AppResult<(Vec<PermissionSummary>, u64)> {
        let state = self.working.lock().await;
        let mut permissions: Vec<&Permission> = state
            .permissions
            .values()
            .filter(|p| filter.matches(&p.name, p.deleted))
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let summaries: Vec<PermissionSummary> = permissions
            .into_iter()
            .map(|permission| {
                let role_count = state
                    .links
                    .values()
                    .filter(|l| l.permission_id == permission.id && !l.deleted)
                    .filter(|l| state.roles.get(&l.role_id).is_some_and(|r| !r.deleted))
                    .count();
                PermissionSummary {
                    permission: permission.clone(),
                    role_count: role_count as u64,
                }
            })
            .collect();

        Ok(paginate(summaries, filter))
    }
}

#[async_trait]
impl RolePermissionRepository for MemoryRepository {
    async fn find_link(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AppResult<Option<RolePermissionLink>> {
        Ok(self
            .working
            .lock()
            .await
            .links
            .get(&(*role_id, *permission_id))
            .cloned())
    }

    async fn save_link(&self, link: &RolePermissionLink) -> AppResult<()> {
        self.check(FaultPoint::SaveLink).await?;
        self.working
            .lock()
            .await
            .links
            .insert((link.role_id, link.permission_id), link.clone());
        Ok(())
    }

    async fn permissions_of_role(&self, role_id: &RoleId) -> AppResult<Vec<Permission>> {
        let state = self.working.lock().await;
        let mut permissions: Vec<Permission> = state
            .links
            .values()
            .filter(|l| l.role_id == *role_id && !l.deleted)
            .filter_map(|l| state.permissions.get(&l.permission_id))
            .filter(|p| !p.deleted)
            .cloned()
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }
}

#[async_trait]
impl RoleAssignmentRepository for MemoryRepository {
    async fn find(
        &self,
        identity_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<Option<RoleAssignment>> {
        Ok(self
            .working
            .lock()
            .await
            .assignments
            .get(&(*identity_id, *role_id))
            .cloned())
    }

    async fn save(&self, assignment: &RoleAssignment) -> AppResult<()> {
        self.check(FaultPoint::SaveAssignment).await?;
        let mut state = self.working.lock().await;
        if assignment.is_primary && !assignment.deleted {
            let clash = state.assignments.values().any(|a| {
                a.identity_id == assignment.identity_id
                    && a.role_id != assignment.role_id
                    && a.is_primary
                    && !a.deleted
            });
            if clash {
                return Err(AppError::conflict("Identity already has a primary role"));
            }
        }
        state.assignments.insert(
            (assignment.identity_id, assignment.role_id),
            assignment.clone(),
        );
        Ok(())
    }

    async fn clear_primary(
        &self,
        identity_id: &IdentityId,
        except: &RoleId,
        actor: Option<ActorId>,
    ) -> AppResult<u64> {
        self.check(FaultPoint::ClearPrimary).await?;
        let mut state = self.working.lock().await;
        let mut cleared = 0;
        for assignment in state.assignments.values_mut().filter(|a| {
            a.identity_id == *identity_id && a.role_id != *except && a.is_primary && !a.deleted
        }) {
            assignment.is_primary = false;
            assignment.audit_info.updated_at = Utc::now();
            assignment.audit_info.updated_by = actor;
            cleared += 1;
        }
        Ok(cleared)
    }

    async fn list_for_identity(
        &self,
        identity_id: &IdentityId,
        include_deleted: bool,
    ) -> AppResult<Vec<HeldRole>> {
        Ok(self
            .working
            .lock()
            .await
            .held_roles(identity_id, include_deleted))
    }

    async fn holders_of(&self, role_id: &RoleId) -> AppResult<Vec<IdentityId>> {
        let state = self.working.lock().await;
        let mut holders: Vec<IdentityId> = state
            .assignments
            .values()
            .filter(|a| a.role_id == *role_id && !a.deleted)
            .map(|a| a.identity_id)
            .collect();
        holders.sort();
        Ok(holders)
    }

    async fn effective_permissions(&self, identity_id: &IdentityId) -> AppResult<Vec<Permission>> {
        let state = self.working.lock().await;
        let mut granted: BTreeMap<PermissionId, Permission> = BTreeMap::new();

        for held in state
            .held_roles(identity_id, false)
            .iter()
            .filter(|h| h.is_active())
        {
            for link in state
                .links
                .values()
                .filter(|l| l.role_id == held.role.id && !l.deleted)
            {
                if let Some(permission) = state.permissions.get(&link.permission_id) {
                    if !permission.deleted {
                        granted.insert(permission.id, permission.clone());
                    }
                }
            }
        }

        let mut permissions: Vec<Permission> = granted.into_values().collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }
}

#[async_trait]
impl IdentityRepository for MemoryRepository {
    async fn find_by_id(&self, id: &IdentityId) -> AppResult<Option<Identity>> {
        Ok(self.working.lock().await.identities.get(id).cloned())
    }

    async fn save(&self, identity: &Identity) -> AppResult<()> {
        self.check(FaultPoint::SaveIdentity).await?;
        self.working
            .lock()
            .await
            .identities
            .insert(identity.id, identity.clone());
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for MemoryRepository {
    async fn find(
        &self,
        id: &IdentityId,
        kind: ProfileKind,
    ) -> AppResult<Option<SpecializedProfile>> {
        Ok(self.working.lock().await.profiles.get(&(*id, kind)).cloned())
    }

    async fn list_for_identity(&self, id: &IdentityId) -> AppResult<Vec<SpecializedProfile>> {
        let state = self.working.lock().await;
        Ok(ProfileKind::ALL
            .iter()
            .filter_map(|kind| state.profiles.get(&(*id, *kind)).cloned())
            .collect())
    }

    async fn save(&self, profile: &SpecializedProfile) -> AppResult<()> {
        self.check(FaultPoint::SaveProfile).await?;
        self.working
            .lock()
            .await
            .profiles
            .insert((profile.id, profile.kind()), profile.clone());
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    fn roles(&self) -> &dyn RoleRepository {
        &self.repo
    }

    fn permissions(&self) -> &dyn PermissionRepository {
        &self.repo
    }

    fn role_permissions(&self) -> &dyn RolePermissionRepository {
        &self.repo
    }

    fn assignments(&self) -> &dyn RoleAssignmentRepository {
        &self.repo
    }

    fn identities(&self) -> &dyn IdentityRepository {
        &self.repo
    }

    fn profiles(&self) -> &dyn ProfileRepository {
        &self.repo
    }

    // 事务本身已独占整个存储
    async fn lock_identity(&self, _id: &IdentityId) -> AppResult<()> {
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut this = *self;
        this.repo.check(FaultPoint::Commit).await?;
        let working = this.repo.working.lock().await.clone();
        *this.committed = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}
