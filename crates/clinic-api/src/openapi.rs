//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성하고
//! `/api-docs/openapi.json` 경로로 제공합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::{routing::get, Json, Router};
use clinic_core::{IdentitySummary, RequestIdentity};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::auth::ErrorBody;
use crate::routes::{
    ComponentHealth, ComponentStatus, CreateUserRequest, CreateUserResponse, HealthResponse,
    LoginRequest, LoginResponse,
};

/// Clinic API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Clinic API",
        description = r#"
# Clinic REST API

JWT Bearer 토큰 인증과 라우트 단위 역할 기반 접근 제어를 제공합니다.

## 인증

`POST /login`으로 토큰을 발급받은 뒤 `Authorization: Bearer <token>` 헤더를 포함하세요.
보호된 라우트는 호출자의 역할에 해당 라우트 템플릿 권한이 있어야 합니다.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    servers(
        (url = "http://localhost:3000", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "auth", description = "인증 - 로그인 및 세션"),
        (name = "users", description = "사용자 - 계정 생성"),
        (name = "health", description = "헬스 체크 - 서버 상태 확인")
    ),
    modifiers(&SecurityAddon),
    components(
        schemas(
            ErrorBody,
            LoginRequest,
            LoginResponse,
            CreateUserRequest,
            CreateUserResponse,
            RequestIdentity,
            IdentitySummary,
            HealthResponse,
            ComponentHealth,
            ComponentStatus,
        )
    ),
    paths(
        crate::routes::auth::login,
        crate::routes::auth::session,
        crate::routes::users::create_user,
        crate::routes::health::health_check,
        crate::routes::health::health_ready,
    )
)]
pub struct ApiDoc;

/// Bearer 인증 스킴 등록.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI JSON 라우터.
///
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn openapi_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_valid() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&spec).unwrap();

        assert!(json.contains("Clinic API"));

        assert!(json.contains("/login"));
        assert!(json.contains("/api/session"));
        assert!(json.contains("/api/users"));
        assert!(json.contains("/health/ready"));

        assert!(json.contains("bearer_auth"));
        assert!(json.contains("LoginResponse"));
    }
}
