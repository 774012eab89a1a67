//! 역할 기반 접근 제어 (RBAC) 타입.
//!
//! 역할, 라우트 권한, 요청 범위 식별 정보 정의.

use serde::{Deserialize, Serialize};

use super::IdentityId;

/// 역할 ID (`roles.role_id`).
pub type RoleId = i32;

/// 사용자 역할.
///
/// 정적 참조 데이터입니다 (예: admin, doctor, nurse).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Role {
    pub role_id: RoleId,
    pub role_name: String,
}

impl Role {
    pub fn new(role_id: RoleId, role_name: impl Into<String>) -> Self {
        Self {
            role_id,
            role_name: role_name.into(),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.role_name, self.role_id)
    }
}

/// 라우트 권한 행 (`api_permissions`).
///
/// 하나의 라우트 템플릿에 허용된 역할마다 한 행이 존재합니다.
/// 행이 없으면 거부됩니다 (default-deny).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutePermission {
    /// 라우트 템플릿 (예: `/api/doctors/{id}`)
    pub route_path: String,
    pub role_id: RoleId,
}

impl RoutePermission {
    pub fn new(route_path: impl Into<String>, role_id: RoleId) -> Self {
        Self {
            route_path: route_path.into(),
            role_id,
        }
    }

    /// (역할, 라우트) 쌍과 정확히 일치하는지 확인.
    ///
    /// 접두사나 와일드카드 매칭은 없습니다.
    pub fn matches(&self, role_id: RoleId, route_path: &str) -> bool {
        self.role_id == role_id && self.route_path == route_path
    }
}

/// 인가를 통과한 요청에 부착되는 식별 정보.
///
/// 요청이 끝나면 함께 사라집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct RequestIdentity {
    #[serde(rename = "user_id")]
    pub identity_id: IdentityId,
    pub role_id: RoleId,
}
