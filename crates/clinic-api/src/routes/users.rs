//! 사용자 관리 endpoint.
//!
//! `POST /api/users`는 다른 보호된 라우트와 동일하게 라우트 권한 검사를 받습니다.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use clinic_core::{IdentityId, RoleId};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use super::validation_message;
use crate::auth::{AuthError, Authenticated, Registration};
use crate::state::AppState;

fn default_active() -> bool {
    true
}

/// 사용자 생성 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100, message = "username must be 1-100 characters"))]
    pub username: String,
    #[validate(length(max = 1024, message = "password is too long"))]
    pub password: String,
    /// 외부 사용자 ID (토큰 subject)
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: IdentityId,
    /// 할당할 역할
    #[serde(default)]
    pub role_id: Option<RoleId>,
    /// 활성 계정 여부 (기본값: true)
    #[serde(default = "default_active")]
    pub active: bool,
}

/// 사용자 생성 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateUserResponse {
    pub message: String,
    pub status: bool,
    pub user_id: IdentityId,
    pub role_id: Option<RoleId>,
    pub role_name: Option<String>,
}

/// 사용자 생성.
///
/// POST /api/users
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "사용자 생성 성공", body = CreateUserResponse),
        (status = 400, description = "잘못된 요청 또는 약한 비밀번호", body = crate::auth::ErrorBody),
        (status = 403, description = "권한 없음", body = crate::auth::ErrorBody),
        (status = 409, description = "사용자명 또는 사용자 ID 중복", body = crate::auth::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUserResponse>), AuthError> {
    let Json(request) = payload.map_err(|e| AuthError::InvalidPayload(e.body_text()))?;
    request
        .validate()
        .map_err(|e| AuthError::InvalidPayload(validation_message(&e)))?;

    let summary = state
        .verifier
        .register(Registration {
            username: request.username,
            password: request.password,
            user_id: request.user_id,
            role_id: request.role_id,
            active: request.active,
        })
        .await?;

    info!(
        created_by = caller.identity_id,
        identity_id = summary.user_id,
        "User created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            message: "User created".to_string(),
            status: true,
            user_id: summary.user_id,
            role_id: summary.role_id,
            role_name: summary.role_name,
        }),
    ))
}
