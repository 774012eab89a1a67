//! 로그인 및 세션 endpoint.
//!
//! - `POST /login`: 사용자명/비밀번호 인증 후 Bearer 토큰 발급 (공개)
//! - `GET /api/session`: 현재 요청의 식별 정보 조회 (보호됨)

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use clinic_core::{RequestIdentity, RoleId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::validation_message;
use crate::auth::{AuthError, Authenticated};
use crate::state::AppState;

/// 로그인 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// 사용자명
    #[validate(length(min = 1, max = 100, message = "username must be 1-100 characters"))]
    pub username: String,
    /// 비밀번호
    #[validate(length(max = 1024, message = "password must be at most 1024 characters"))]
    pub password: String,
}

/// 로그인 성공 응답.
///
/// `role_id`, `role_name`은 표시용이며 이후 인가 판단에 사용되지 않습니다.
/// 역할이 할당되지 않은 계정은 두 필드가 응답에서 생략됩니다.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub message: String,
    pub status: bool,
    /// Bearer 토큰
    pub token: String,
    pub user_id: i32,
    /// 할당된 역할 ID (역할이 없으면 생략)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(required = false)]
    pub role_id: Option<RoleId>,
    /// 할당된 역할 이름 (역할이 없으면 생략)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(required = false)]
    pub role_name: Option<String>,
}

/// 로그인.
///
/// POST /login
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "로그인 성공", body = LoginResponse),
        (status = 400, description = "잘못된 요청 본문", body = crate::auth::ErrorBody),
        (status = 401, description = "잘못된 자격 증명 또는 비활성 계정", body = crate::auth::ErrorBody),
        (status = 429, description = "로그인 시도 제한 초과", body = crate::auth::ErrorBody)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthError> {
    let Json(request) = payload.map_err(|e| AuthError::InvalidPayload(e.body_text()))?;
    request
        .validate()
        .map_err(|e| AuthError::InvalidPayload(validation_message(&e)))?;

    let outcome = state
        .verifier
        .login(&request.username, &request.password)
        .await?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        status: true,
        token: outcome.token,
        user_id: outcome.identity.user_id,
        role_id: outcome.identity.role_id,
        role_name: outcome.identity.role_name,
    }))
}

/// 현재 세션 조회.
///
/// GET /api/session
#[utoipa::path(
    get,
    path = "/api/session",
    tag = "auth",
    responses(
        (status = 200, description = "요청 식별 정보", body = RequestIdentity),
        (status = 401, description = "인증 실패", body = crate::auth::ErrorBody),
        (status = 403, description = "권한 없음", body = crate::auth::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn session(Authenticated(identity): Authenticated) -> Json<RequestIdentity> {
    Json(identity)
}
