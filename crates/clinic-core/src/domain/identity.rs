//! 사용자 식별 정보.
//!
//! 저장소 협력자가 소유하며, 인증 코어는 읽기만 합니다.

use serde::{Deserialize, Serialize};

use super::{Role, RoleId};

/// 외부 사용자 ID (`user_table.user_id`).
///
/// 토큰의 subject와 로그인 응답의 `user_id`에 사용됩니다.
pub type IdentityId = i32;

/// 계정 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// 활성 - 로그인 가능
    Active,
    /// 비활성 - 비밀번호가 맞아도 로그인 불가
    Inactive,
}

impl AccountStatus {
    /// DB 상태 코드에서 변환 (1 = active, 그 외 = inactive).
    pub fn from_code(code: i16) -> Self {
        if code == 1 {
            AccountStatus::Active
        } else {
            AccountStatus::Inactive
        }
    }

    /// DB 상태 코드 반환.
    pub fn code(&self) -> i16 {
        match self {
            AccountStatus::Active => 1,
            AccountStatus::Inactive => 0,
        }
    }

    /// 활성 상태인지 확인.
    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

/// 저장된 사용자 식별 레코드.
#[derive(Clone)]
pub struct Identity {
    /// 내부 PK (`user_table.id`)
    pub internal_id: i32,
    /// 로그인 사용자명
    pub username: String,
    /// PHC 형식 비밀번호 해시
    pub password_hash: String,
    /// 외부 사용자 ID
    pub user_id: IdentityId,
    /// 계정 상태
    pub status: AccountStatus,
    /// 할당된 역할 (없을 수 있음)
    pub role: Option<Role>,
}

impl Identity {
    /// 활성 계정인지 확인.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// 클라이언트 표시용 요약 정보 생성.
    pub fn summary(&self) -> IdentitySummary {
        IdentitySummary {
            user_id: self.user_id,
            role_id: self.role.as_ref().map(|r| r.role_id),
            role_name: self.role.as_ref().map(|r| r.role_name.clone()),
        }
    }
}

// 비밀번호 해시는 로그에 남기지 않는다
impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("internal_id", &self.internal_id)
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("status", &self.status)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// 로그인 응답에 포함되는 사용자 요약.
///
/// 표시용 정보일 뿐이며, 이후 인가 판단에는 사용되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct IdentitySummary {
    pub user_id: IdentityId,
    pub role_id: Option<RoleId>,
    pub role_name: Option<String>,
}

/// 새 사용자 입력 (비밀번호는 이미 해싱된 상태).
#[derive(Clone)]
pub struct NewIdentity {
    pub username: String,
    pub password_hash: String,
    pub user_id: IdentityId,
    pub status: AccountStatus,
    pub role_id: Option<RoleId>,
}

impl std::fmt::Debug for NewIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewIdentity")
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("status", &self.status)
            .field("role_id", &self.role_id)
            .finish_non_exhaustive()
    }
}
