//! 사용자명/비밀번호 인증.
//!
//! 로그인 성공 시 Bearer 토큰과 표시용 사용자 요약을 반환합니다.
//! 존재하지 않는 사용자와 잘못된 비밀번호는 동일한 에러로 응답합니다.

use std::sync::Arc;

use clinic_core::{AccountStatus, IdentityId, IdentityStore, IdentitySummary, NewIdentity, RoleId};
use tracing::{info, warn};

use super::{
    error::AuthError,
    password::{burn_verification, hash_password, validate_password_strength, verify_password},
    token::TokenService,
};
use crate::metrics::record_login;

/// 로그인 성공 결과.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub identity: IdentitySummary,
}

/// 사용자 등록 입력.
#[derive(Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub user_id: IdentityId,
    pub role_id: Option<RoleId>,
    pub active: bool,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("role_id", &self.role_id)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// 자격 증명 검증기.
#[derive(Clone)]
pub struct CredentialVerifier {
    identities: Arc<dyn IdentityStore>,
    tokens: Arc<TokenService>,
}

impl CredentialVerifier {
    pub fn new(identities: Arc<dyn IdentityStore>, tokens: Arc<TokenService>) -> Self {
        Self { identities, tokens }
    }

    /// 사용자명/비밀번호 인증 후 토큰 발급.
    ///
    /// 순서: 사용자 조회 → 계정 상태 확인 → 비밀번호 비교 → 토큰 발급.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidCredentials`: 사용자 없음 또는 비밀번호 불일치
    /// - `AuthError::AccountInactive`: 비활성 계정
    /// - `AuthError::Internal`: 저장소 또는 토큰 발급 실패
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let result = self.authenticate(username, password).await;

        match &result {
            Ok(outcome) => {
                record_login("success");
                info!(
                    username,
                    identity_id = outcome.identity.user_id,
                    "Login successful"
                );
            }
            Err(e) => {
                record_login(e.code());
                warn!(username, reason = e.code(), "Login failed");
            }
        }

        result
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let identity = self
            .identities
            .find_by_username(username)
            .await
            .map_err(|e| AuthError::Internal(format!("identity lookup: {e}")))?;

        let Some(identity) = identity else {
            // 사용자 존재 여부가 응답 시간으로 드러나지 않도록 동일한 비용을 소모
            let password = password.to_owned();
            let _ = tokio::task::spawn_blocking(move || burn_verification(&password)).await;
            return Err(AuthError::InvalidCredentials);
        };

        if !identity.is_active() {
            return Err(AuthError::AccountInactive);
        }

        let password = password.to_owned();
        let hash = identity.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("password verification task: {e}")))?;

        if verified.is_err() {
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.issue(identity.user_id)?;

        Ok(LoginOutcome {
            token,
            identity: identity.summary(),
        })
    }

    /// 새 사용자 등록.
    ///
    /// 비밀번호 강도를 검증한 뒤 Argon2id로 해싱하여 저장합니다.
    ///
    /// # Errors
    ///
    /// - `AuthError::WeakPassword`: 강도 요구사항 미충족
    /// - `AuthError::Conflict`: 사용자명 또는 사용자 ID 중복
    /// - `AuthError::InvalidPayload`: 존재하지 않는 역할
    pub async fn register(&self, registration: Registration) -> Result<IdentitySummary, AuthError> {
        validate_password_strength(&registration.password).map_err(AuthError::WeakPassword)?;

        let password = registration.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("password hashing task: {e}")))?
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let status = if registration.active {
            AccountStatus::Active
        } else {
            AccountStatus::Inactive
        };

        let created = self
            .identities
            .create(NewIdentity {
                username: registration.username,
                password_hash,
                user_id: registration.user_id,
                status,
                role_id: registration.role_id,
            })
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    AuthError::Conflict(e.to_string())
                } else if e.is_invalid_reference() {
                    AuthError::InvalidPayload(e.to_string())
                } else {
                    AuthError::Internal(format!("identity create: {e}"))
                }
            })?;

        info!(
            username = %created.username,
            identity_id = created.user_id,
            "User registered"
        );

        Ok(created.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;
    use chrono::Duration;
    use secrecy::SecretString;

    const SECRET: &str = "credential-test-secret-0123456789abcdef";

    fn tokens() -> Arc<TokenService> {
        Arc::new(TokenService::new(
            &SecretString::from(SECRET.to_string()),
            Duration::minutes(60),
        ))
    }

    fn setup() -> (MemoryStore, CredentialVerifier, Arc<TokenService>) {
        let store = MemoryStore::new();
        store.add_role(2, "nurse");
        store.add_identity("alice", "Password1", 1001, true, &[2]);
        store.add_identity("ivan", "Password1", 1002, false, &[2]);

        let tokens = tokens();
        let verifier = CredentialVerifier::new(Arc::new(store.clone()), tokens.clone());
        (store, verifier, tokens)
    }

    #[tokio::test]
    async fn test_login_success() {
        let (_, verifier, tokens) = setup();

        let outcome = verifier.login("alice", "Password1").await.unwrap();

        assert_eq!(outcome.identity.user_id, 1001);
        assert_eq!(outcome.identity.role_id, Some(2));
        assert_eq!(outcome.identity.role_name.as_deref(), Some("nurse"));
        assert_eq!(tokens.validate(&outcome.token).unwrap().identity_id, 1001);
    }

    #[tokio::test]
    async fn test_inactive_rejected_regardless_of_password() {
        let (_, verifier, _) = setup();

        for password in ["Password1", "wrong", ""] {
            let err = verifier.login("ivan", password).await.unwrap_err();
            assert!(
                matches!(err, AuthError::AccountInactive),
                "password {password:?} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_user_indistinguishable_from_wrong_password() {
        let (_, verifier, _) = setup();

        let wrong_password = verifier.login("alice", "Password2").await.unwrap_err();

        for username in ["mallory", "ALICE", "alice ", ""] {
            let unknown = verifier.login(username, "Password1").await.unwrap_err();

            assert!(matches!(unknown, AuthError::InvalidCredentials));
            assert_eq!(unknown.code(), wrong_password.code());
            assert_eq!(unknown.status_code(), wrong_password.status_code());
            assert_eq!(unknown.public_message(), wrong_password.public_message());
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_internal() {
        let (store, verifier, _) = setup();
        store.fail_identity_reads(true);

        let err = verifier.login("alice", "Password1").await.unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (_, verifier, _) = setup();

        let summary = verifier
            .register(Registration {
                username: "carol".into(),
                password: "Secret123".into(),
                user_id: 2001,
                role_id: Some(2),
                active: true,
            })
            .await
            .unwrap();
        assert_eq!(summary.user_id, 2001);

        let outcome = verifier.login("carol", "Secret123").await.unwrap();
        assert_eq!(outcome.identity.role_name.as_deref(), Some("nurse"));
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password_and_duplicates() {
        let (_, verifier, _) = setup();

        let registration = |username: &str, password: &str, user_id| Registration {
            username: username.into(),
            password: password.into(),
            user_id,
            role_id: None,
            active: true,
        };

        assert!(matches!(
            verifier.register(registration("dave", "short", 3001)).await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            verifier.register(registration("alice", "Password9", 3002)).await,
            Err(AuthError::Conflict(_))
        ));

        let unknown_role = Registration {
            role_id: Some(99),
            ..registration("erin", "Password9", 3003)
        };
        let err = verifier.register(unknown_role).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidPayload(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
