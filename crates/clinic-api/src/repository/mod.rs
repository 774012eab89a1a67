//! Repository pattern for database operations.
//!
//! 인증/인가 저장소 인터페이스의 구현체를 제공합니다.
//! - [`PgAccessRepository`]: PostgreSQL
//! - [`UnconfiguredStore`]: 데이터베이스 미설정 시 모든 조회 실패 (fail-closed)
//! - `MemoryStore`: 테스트용 인메모리 구현 (`test-utils` 기능)

#[cfg(any(test, feature = "test-utils"))]
mod memory;
mod postgres;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;
pub use postgres::PgAccessRepository;

use async_trait::async_trait;
use clinic_core::{
    Identity, IdentityId, IdentityStore, NewIdentity, PermissionStore, RoleId, StoreError,
    StoreResult,
};

/// 데이터베이스가 설정되지 않았을 때 사용하는 저장소.
///
/// 모든 조회가 `StoreError::NotConfigured`로 실패하므로
/// 로그인은 500, 보호된 라우트는 500으로 응답합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredStore;

#[async_trait]
impl IdentityStore for UnconfiguredStore {
    async fn find_by_username(&self, _username: &str) -> StoreResult<Option<Identity>> {
        Err(StoreError::NotConfigured)
    }

    async fn create(&self, _identity: NewIdentity) -> StoreResult<Identity> {
        Err(StoreError::NotConfigured)
    }
}

#[async_trait]
impl PermissionStore for UnconfiguredStore {
    async fn find_role_for_route(
        &self,
        _identity_id: IdentityId,
        _route_path: &str,
    ) -> StoreResult<Option<RoleId>> {
        Err(StoreError::NotConfigured)
    }

    async fn count_route_permissions(
        &self,
        _role_id: RoleId,
        _route_path: &str,
    ) -> StoreResult<i64> {
        Err(StoreError::NotConfigured)
    }
}
