//! 인증/인가 에러.
//!
//! 클라이언트에 노출되는 유일한 에러 분류입니다.
//! 모든 응답은 `{"message", "status": false, "code"}` 형식을 따릅니다.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::{permissions::PermissionError, token::TokenError};

/// 에러 응답 본문.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    /// 사람이 읽을 수 있는 메시지
    pub message: String,
    /// 항상 `false`
    pub status: bool,
    /// 에러 코드 (예: "TOKEN_EXPIRED")
    pub code: String,
}

/// 인증/인가 에러.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is missing")]
    AuthHeaderMissing,

    #[error("Authorization header must use the Bearer scheme")]
    MalformedAuthHeader,

    #[error("Token is malformed")]
    TokenMalformed,

    #[error("Token signature is invalid")]
    SignatureInvalid,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Role resolution failed: {0}")]
    RoleResolutionFailed(String),

    #[error("Not Authorized")]
    PermissionDenied,

    #[error("Invalid request payload: {0}")]
    InvalidPayload(String),

    #[error("Weak password: {0}")]
    WeakPassword(&'static str),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests")]
    TooManyRequests { retry_after: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP 상태 코드.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::AuthHeaderMissing
            | AuthError::MalformedAuthHeader
            | AuthError::TokenMalformed
            | AuthError::SignatureInvalid
            | AuthError::TokenExpired
            | AuthError::InvalidCredentials
            | AuthError::AccountInactive => StatusCode::UNAUTHORIZED,
            AuthError::PermissionDenied => StatusCode::FORBIDDEN,
            AuthError::InvalidPayload(_) | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::RoleResolutionFailed(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 에러 코드 (메트릭 라벨로도 사용).
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::AuthHeaderMissing => "AUTH_HEADER_MISSING",
            AuthError::MalformedAuthHeader => "MALFORMED_AUTH_HEADER",
            AuthError::TokenMalformed => "TOKEN_MALFORMED",
            AuthError::SignatureInvalid => "SIGNATURE_INVALID",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::AccountInactive => "ACCOUNT_INACTIVE",
            AuthError::RoleResolutionFailed(_) => "ROLE_RESOLUTION_FAILED",
            AuthError::PermissionDenied => "PERMISSION_DENIED",
            AuthError::InvalidPayload(_) => "INVALID_PAYLOAD",
            AuthError::WeakPassword(_) => "WEAK_PASSWORD",
            AuthError::Conflict(_) => "CONFLICT",
            AuthError::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            AuthError::Internal(_) => "INTERNAL",
        }
    }

    /// 클라이언트에 보여줄 메시지.
    ///
    /// 5xx 에러의 내부 원인은 노출하지 않습니다.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::RoleResolutionFailed(_) | AuthError::Internal(_) => {
                "Internal Server Error".to_string()
            }
            AuthError::InvalidPayload(_) => "Invalid request payload".to_string(),
            AuthError::Conflict(_) => "User already exists".to_string(),
            AuthError::TooManyRequests { .. } => {
                "Too many login attempts. Please try again later.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// 응답 본문 생성.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            message: self.public_message(),
            status: false,
            code: self.code().to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response = (self.status_code(), Json(self.body())).into_response();

        if let AuthError::TooManyRequests { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }

        response
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => AuthError::TokenMalformed,
            TokenError::SignatureInvalid => AuthError::SignatureInvalid,
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::TtlOutOfRange => AuthError::Internal("token ttl out of range".into()),
            TokenError::Encoding(e) => AuthError::Internal(format!("token encoding: {e}")),
        }
    }
}

impl From<PermissionError> for AuthError {
    fn from(err: PermissionError) -> Self {
        AuthError::RoleResolutionFailed(err.to_string())
    }
}
