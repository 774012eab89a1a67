//! 저장소 협력자 인터페이스.
//!
//! 인증 코어는 관계형 저장소를 두 개의 trait으로만 사용합니다:
//! - [`IdentityStore`]: 사용자명으로 식별 정보 조회 (로그인)
//! - [`PermissionStore`]: 역할 해석 및 라우트 권한 조회 (인가)
//!
//! 구현체는 요청마다 현재 데이터를 읽어야 하며 캐싱하지 않습니다.

use async_trait::async_trait;

use super::{Identity, IdentityId, NewIdentity, RoleId};
use crate::StoreResult;

/// 사용자 식별 정보 저장소.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// 사용자명으로 식별 정보 조회.
    ///
    /// 할당된 역할이 있으면 함께 조회합니다.
    /// 사용자가 없으면 `Ok(None)`.
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Identity>>;

    /// 새 사용자 저장.
    ///
    /// # Errors
    ///
    /// - `StoreError::Conflict`: 사용자명 또는 외부 사용자 ID 중복
    async fn create(&self, identity: NewIdentity) -> StoreResult<Identity>;
}

/// 역할/권한 저장소.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// 사용자의 역할 중 해당 라우트에 사용할 역할 조회.
    ///
    /// 라우트 권한이 있는 역할을 우선하고, 없으면 가장 작은 역할 ID를 반환합니다.
    /// 사용자가 없거나 할당된 역할이 없으면 `Ok(None)`.
    async fn find_role_for_route(
        &self,
        identity_id: IdentityId,
        route_path: &str,
    ) -> StoreResult<Option<RoleId>>;

    /// (라우트, 역할)과 정확히 일치하는 권한 행 수.
    async fn count_route_permissions(&self, role_id: RoleId, route_path: &str)
        -> StoreResult<i64>;
}
