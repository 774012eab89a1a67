//! 클리닉 REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API
//! - JWT 인증 및 라우트 단위 역할 기반 접근 제어
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 토큰, 자격 증명, 권한 판정, 접근 제어 미들웨어
//! - [`repository`]: 저장소 구현체 (PostgreSQL)
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서

pub mod auth;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod state;

pub use auth::{
    access_middleware, AuthError, Authenticated, CredentialVerifier, PermissionResolver,
    TokenService,
};
pub use metrics::setup_metrics_recorder;
pub use middleware::{metrics_layer, LoginThrottle};
pub use routes::create_api_router;
pub use state::AppState;

#[cfg(any(test, feature = "test-utils"))]
pub use state::{create_test_state, TestState, TestStateBuilder};
