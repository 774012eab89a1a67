//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 인증 구성 요소와 데이터베이스 풀을 보관합니다.
//! Arc로 래핑되어 여러 요청 간에 안전하게 공유되며, 요청 간에 변경되는 상태는 없습니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clinic_core::{AuthConfig, IdentityStore, PermissionStore};

use crate::auth::{CredentialVerifier, PermissionResolver, TokenService};
use crate::repository::{PgAccessRepository, UnconfiguredStore};

/// 애플리케이션 공유 상태.
///
/// Axum의 State extractor를 통해 핸들러와 미들웨어에 주입됩니다.
#[derive(Clone)]
pub struct AppState {
    /// 토큰 발급/검증 (서명 키는 생성 시 고정)
    pub tokens: Arc<TokenService>,

    /// 로그인 및 사용자 등록
    pub verifier: CredentialVerifier,

    /// 역할 해석 및 라우트 권한 확인
    pub permissions: PermissionResolver,

    /// 데이터베이스 연결 풀 (PostgreSQL)
    pub db_pool: Option<sqlx::PgPool>,

    /// 서버 시작 시간
    pub started_at: DateTime<Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 저장소 구현체를 직접 주입하여 생성.
    pub fn new(
        tokens: Arc<TokenService>,
        identities: Arc<dyn IdentityStore>,
        permissions: Arc<dyn PermissionStore>,
    ) -> Self {
        Self {
            verifier: CredentialVerifier::new(identities, tokens.clone()),
            permissions: PermissionResolver::new(permissions),
            tokens,
            db_pool: None,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 설정과 (선택적) 데이터베이스 풀로 생성.
    ///
    /// 풀이 없으면 모든 저장소 조회가 실패하는 상태로 시작합니다.
    pub fn from_config(auth: &AuthConfig, pool: Option<sqlx::PgPool>) -> Self {
        let tokens = Arc::new(TokenService::from_config(auth));

        match pool {
            Some(pool) => {
                let repo = Arc::new(PgAccessRepository::new(pool.clone()));
                Self::new(tokens, repo.clone(), repo).with_db_pool(pool)
            }
            None => {
                let store = Arc::new(UnconfiguredStore);
                Self::new(tokens, store.clone(), store)
            }
        }
    }

    /// 데이터베이스 풀 설정.
    pub fn with_db_pool(mut self, pool: sqlx::PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// 데이터베이스가 설정되어 있는지 확인.
    pub fn has_db(&self) -> bool {
        self.db_pool.is_some()
    }

    /// 서버 업타임(초) 반환.
    pub fn uptime_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        if let Some(pool) = &self.db_pool {
            sqlx::query("SELECT 1").fetch_one(pool).await.is_ok()
        } else {
            false
        }
    }
}

/// 테스트용 JWT 서명 키.
#[cfg(any(test, feature = "test-utils"))]
pub const TEST_JWT_SECRET: &str = "test-secret-key-for-clinic-api-0123456789";

/// 테스트 상태와 공유 인메모리 저장소.
#[cfg(any(test, feature = "test-utils"))]
pub struct TestState {
    pub state: Arc<AppState>,
    pub store: crate::repository::MemoryStore,
}

/// 인메모리 저장소 기반 테스트 상태 빌더.
///
/// # 사용 예시
///
/// ```rust,ignore
/// let built = TestStateBuilder::new()
///     .role(2, "nurse")
///     .identity("alice", "Password1", 1001, true, &[2])
///     .grant("/api/patients", 2)
///     .build();
/// ```
#[cfg(any(test, feature = "test-utils"))]
pub struct TestStateBuilder {
    store: crate::repository::MemoryStore,
    ttl: chrono::Duration,
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl TestStateBuilder {
    pub fn new() -> Self {
        Self {
            store: crate::repository::MemoryStore::new(),
            ttl: chrono::Duration::minutes(60),
        }
    }

    pub fn role(self, role_id: clinic_core::RoleId, role_name: &str) -> Self {
        self.store.add_role(role_id, role_name);
        self
    }

    pub fn identity(
        self,
        username: &str,
        password: &str,
        user_id: clinic_core::IdentityId,
        active: bool,
        role_ids: &[clinic_core::RoleId],
    ) -> Self {
        self.store
            .add_identity(username, password, user_id, active, role_ids);
        self
    }

    pub fn grant(self, route_path: &str, role_id: clinic_core::RoleId) -> Self {
        self.store.grant(route_path, role_id);
        self
    }

    pub fn token_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn build(self) -> TestState {
        let secret = secrecy::SecretString::from(TEST_JWT_SECRET.to_string());
        let tokens = Arc::new(TokenService::new(&secret, self.ttl));
        let store = Arc::new(self.store.clone());

        TestState {
            state: Arc::new(AppState::new(tokens, store.clone(), store)),
            store: self.store,
        }
    }
}

/// 테스트용 AppState 생성 헬퍼.
///
/// 데이터가 없는 인메모리 저장소를 사용합니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> Arc<AppState> {
    TestStateBuilder::new().build().state
}
