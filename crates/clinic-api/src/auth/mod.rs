//! 인증 및 권한 부여.
//!
//! JWT 기반 인증 및 라우트 단위 역할 기반 접근 제어(RBAC)를 제공합니다.
//!
//! # 구성 요소
//!
//! - [`TokenService`]: Bearer 토큰 발급/검증
//! - [`CredentialVerifier`]: 사용자명/비밀번호 인증 및 사용자 등록
//! - [`PermissionResolver`]: 역할 해석 및 라우트 권한 확인
//! - [`access_middleware`]: 위 세 구성 요소를 묶는 요청 단위 게이트
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn protected_handler(
//!     Authenticated(identity): Authenticated,
//! ) -> impl IntoResponse {
//!     format!("Hello, {}!", identity.identity_id)
//! }
//! ```

mod credentials;
mod error;
mod middleware;
mod password;
mod permissions;
mod token;

pub use credentials::{CredentialVerifier, LoginOutcome, Registration};
pub use error::{AuthError, ErrorBody};
pub use middleware::{access_middleware, extract_bearer, Authenticated};
pub use password::{hash_password, validate_password_strength, verify_password, PasswordError};
pub use permissions::{PermissionError, PermissionResolver};
pub use token::{Claims, TokenError, TokenService, VerifiedClaims, TOKEN_ALGORITHM};
