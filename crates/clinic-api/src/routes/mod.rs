//! API 라우트.
//!
//! # 라우트 구조
//!
//! 공개:
//! - `POST /login` - 로그인 (IP별 시도 제한)
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//!
//! 보호됨 (Bearer 토큰 + 라우트 권한 필요):
//! - `GET /api/session` - 현재 요청의 식별 정보
//! - `POST /api/users` - 사용자 생성
//!
//! 보호된 라우트의 권한 키는 여기 등록된 라우트 템플릿 문자열 그대로입니다
//! (예: `/api/doctors/{id}`). `api_permissions.route_path`도 같은 형식으로 저장해야 합니다.

pub mod auth;
pub mod health;
pub mod users;

pub use auth::{LoginRequest, LoginResponse};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use users::{CreateUserRequest, CreateUserResponse};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use validator::ValidationErrors;

use crate::auth::access_middleware;
use crate::middleware::{login_throttle_middleware, LoginThrottle};
use crate::state::AppState;

/// 기본 보호 라우트.
///
/// 접근 제어 레이어는 [`create_api_router`]에서 적용됩니다.
pub fn protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/session", get(auth::session))
        .route("/api/users", post(users::create_user))
}

/// 전체 API 라우터 생성.
///
/// `downstream`은 접근 제어 뒤에 둘 추가 라우트입니다 (도메인 CRUD 핸들러 등).
/// 접근 제어는 `route_layer`로 설치되므로 매칭된 라우트에만 적용되고,
/// 존재하지 않는 경로는 인증 없이 404가 됩니다.
pub fn create_api_router(
    state: Arc<AppState>,
    throttle: LoginThrottle,
    downstream: Router<Arc<AppState>>,
) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/login", post(auth::login))
        .route_layer(middleware::from_fn_with_state(
            throttle,
            login_throttle_middleware,
        ));

    let protected = protected_router()
        .merge(downstream)
        .route_layer(middleware::from_fn_with_state(state, access_middleware));

    Router::new()
        .merge(public)
        .merge(health_router())
        .merge(protected)
}

/// 검증 에러를 하나의 메시지로 결합.
pub(crate) fn validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field}: invalid value"))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}
