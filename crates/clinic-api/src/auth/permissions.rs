//! 라우트 권한 판정.
//!
//! 요청마다 저장소를 다시 조회하므로 권한 변경은 다음 요청부터 즉시 반영됩니다.
//! 캐싱과 재시도는 없습니다.

use std::sync::Arc;

use clinic_core::{IdentityId, PermissionStore, RoleId, StoreError};
use tracing::{debug, error};

/// 권한 판정 실패.
///
/// 두 경우 모두 클라이언트에는 동일한 500 응답으로 노출되고,
/// 로그에서만 구분됩니다.
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    /// 사용자에게 할당된 역할이 없음 (설정 불일치)
    #[error("no role mapping for identity {identity_id}")]
    NoRoleMapping { identity_id: IdentityId },

    /// 저장소 조회 실패
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// 역할 해석 및 권한 확인.
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn PermissionStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    /// 라우트 컨텍스트에서 사용자의 역할 해석.
    ///
    /// 라우트 권한이 있는 역할을 우선하며, 없으면 가장 작은 역할 ID를 사용합니다.
    pub async fn resolve_role(
        &self,
        identity_id: IdentityId,
        route_path: &str,
    ) -> Result<RoleId, PermissionError> {
        match self.store.find_role_for_route(identity_id, route_path).await {
            Ok(Some(role_id)) => {
                debug!(identity_id, route = route_path, role_id, "Role resolved");
                Ok(role_id)
            }
            Ok(None) => {
                error!(
                    identity_id,
                    route = route_path,
                    "No role mapping found for identity"
                );
                Err(PermissionError::NoRoleMapping { identity_id })
            }
            Err(e) => {
                error!(
                    identity_id,
                    route = route_path,
                    error = %e,
                    "Storage error during role resolution"
                );
                Err(PermissionError::Storage(e))
            }
        }
    }

    /// (역할, 라우트)에 대한 권한 행 존재 여부.
    ///
    /// 행이 없으면 `Ok(false)`입니다. 저장소 에러는 절대 허용으로 취급하지 않습니다.
    pub async fn has_permission(
        &self,
        role_id: RoleId,
        route_path: &str,
    ) -> Result<bool, PermissionError> {
        match self.store.count_route_permissions(role_id, route_path).await {
            Ok(count) => Ok(count > 0),
            Err(e) => {
                error!(
                    role_id,
                    route = route_path,
                    error = %e,
                    "Storage error during permission check"
                );
                Err(PermissionError::Storage(e))
            }
        }
    }
}
