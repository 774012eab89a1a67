//! 인메모리 저장소.
//!
//! 테스트와 로컬 실행용 `IdentityStore` / `PermissionStore` 구현입니다.
//! 조회 횟수를 기록하고 장애를 주입할 수 있습니다.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use clinic_core::{
    AccountStatus, Identity, IdentityId, IdentityStore, NewIdentity, PermissionStore, Role,
    RoleId, RoutePermission, StoreError, StoreResult,
};

use crate::auth::hash_password;

#[derive(Default)]
struct Tables {
    identities: Vec<Identity>,
    roles: HashMap<RoleId, Role>,
    user_roles: HashMap<IdentityId, BTreeSet<RoleId>>,
    permissions: Vec<RoutePermission>,
}

#[derive(Default)]
struct Inner {
    tables: RwLock<Tables>,
    role_lookups: AtomicUsize,
    identity_lookups: AtomicUsize,
    fail_identity_reads: AtomicBool,
    fail_permission_reads: AtomicBool,
}

/// 인메모리 저장소.
///
/// 복제본은 같은 데이터를 공유합니다.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.inner
            .tables
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.inner
            .tables
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 역할 등록.
    pub fn add_role(&self, role_id: RoleId, role_name: &str) {
        self.write().roles.insert(role_id, Role::new(role_id, role_name));
    }

    /// 사용자 등록 (비밀번호는 Argon2로 해싱).
    pub fn add_identity(
        &self,
        username: &str,
        password: &str,
        user_id: IdentityId,
        active: bool,
        role_ids: &[RoleId],
    ) {
        let password_hash = hash_password(password).unwrap_or_default();
        let mut tables = self.write();

        let internal_id = tables.identities.len() as i32 + 1;
        let role = role_ids
            .iter()
            .min()
            .and_then(|id| tables.roles.get(id).cloned());

        tables.identities.push(Identity {
            internal_id,
            username: username.to_string(),
            password_hash,
            user_id,
            status: if active {
                AccountStatus::Active
            } else {
                AccountStatus::Inactive
            },
            role,
        });
        tables
            .user_roles
            .entry(user_id)
            .or_default()
            .extend(role_ids.iter().copied());
    }

    /// 라우트 권한 부여.
    pub fn grant(&self, route_path: &str, role_id: RoleId) {
        self.write()
            .permissions
            .push(RoutePermission::new(route_path, role_id));
    }

    /// 라우트 권한 회수.
    pub fn revoke(&self, route_path: &str, role_id: RoleId) {
        self.write()
            .permissions
            .retain(|p| !p.matches(role_id, route_path));
    }

    /// 사용자 조회 장애 주입.
    pub fn fail_identity_reads(&self, fail: bool) {
        self.inner.fail_identity_reads.store(fail, Ordering::SeqCst);
    }

    /// 역할/권한 조회 장애 주입.
    pub fn fail_permission_reads(&self, fail: bool) {
        self.inner.fail_permission_reads.store(fail, Ordering::SeqCst);
    }

    /// 역할 해석 조회 횟수.
    pub fn role_lookups(&self) -> usize {
        self.inner.role_lookups.load(Ordering::SeqCst)
    }

    /// 사용자 조회 횟수.
    pub fn identity_lookups(&self) -> usize {
        self.inner.identity_lookups.load(Ordering::SeqCst)
    }

    fn check_permission_reads(&self) -> StoreResult<()> {
        if self.inner.fail_permission_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected permission read failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Identity>> {
        self.inner.identity_lookups.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_identity_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected identity read failure".into()));
        }

        Ok(self
            .read()
            .identities
            .iter()
            .find(|i| i.username == username)
            .cloned())
    }

    async fn create(&self, identity: NewIdentity) -> StoreResult<Identity> {
        let mut tables = self.write();

        if tables.identities.iter().any(|i| i.username == identity.username) {
            return Err(StoreError::Conflict(format!(
                "username '{}' already exists",
                identity.username
            )));
        }
        if tables.identities.iter().any(|i| i.user_id == identity.user_id) {
            return Err(StoreError::Conflict(format!(
                "user_id {} already exists",
                identity.user_id
            )));
        }

        let role = match identity.role_id {
            Some(role_id) => Some(
                tables
                    .roles
                    .get(&role_id)
                    .cloned()
                    .ok_or_else(|| StoreError::InvalidReference(format!("role {role_id}")))?,
            ),
            None => None,
        };

        let created = Identity {
            internal_id: tables.identities.len() as i32 + 1,
            username: identity.username,
            password_hash: identity.password_hash,
            user_id: identity.user_id,
            status: identity.status,
            role,
        };

        if let Some(role_id) = identity.role_id {
            tables
                .user_roles
                .entry(created.user_id)
                .or_default()
                .insert(role_id);
        }
        tables.identities.push(created.clone());

        Ok(created)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn find_role_for_route(
        &self,
        identity_id: IdentityId,
        route_path: &str,
    ) -> StoreResult<Option<RoleId>> {
        self.inner.role_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_permission_reads()?;

        let tables = self.read();
        let Some(roles) = tables.user_roles.get(&identity_id) else {
            return Ok(None);
        };

        let permitted = roles.iter().copied().find(|role_id| {
            tables
                .permissions
                .iter()
                .any(|p| p.matches(*role_id, route_path))
        });

        Ok(permitted.or_else(|| roles.iter().next().copied()))
    }

    async fn count_route_permissions(&self, role_id: RoleId, route_path: &str) -> StoreResult<i64> {
        self.check_permission_reads()?;

        Ok(self
            .read()
            .permissions
            .iter()
            .filter(|p| p.matches(role_id, route_path))
            .count() as i64)
    }
}
