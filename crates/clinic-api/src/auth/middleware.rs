//! 요청 단위 접근 제어 미들웨어.
//!
//! 토큰 검증 → 역할 해석 → 권한 확인을 순서대로 수행하고,
//! 모두 통과한 요청에만 [`RequestIdentity`]를 부착해 핸들러로 전달합니다.
//!
//! 권한 키는 요청 경로가 아니라 라우트 등록 시점의 템플릿(`MatchedPath`)입니다.
//! 따라서 이 미들웨어는 반드시 `Router::route_layer`로 설치해야 합니다.
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/api/patients", get(list_patients))
//!     .route_layer(middleware::from_fn_with_state(state.clone(), access_middleware));
//!
//! async fn list_patients(Authenticated(identity): Authenticated) -> impl IntoResponse {
//!     format!("caller: {}", identity.identity_id)
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use clinic_core::{access_span, RequestIdentity};
use tracing::{debug, error, warn, Instrument};

use super::error::AuthError;
use crate::{metrics::record_access_decision, state::AppState};

/// Authorization 헤더에서 Bearer 토큰 추출.
///
/// # Errors
///
/// - `AuthError::AuthHeaderMissing`: 헤더 없음
/// - `AuthError::MalformedAuthHeader`: `Bearer <token>` 형식이 아님
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::AuthHeaderMissing)?
        .to_str()
        .map_err(|_| AuthError::MalformedAuthHeader)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedAuthHeader)?;

    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::MalformedAuthHeader);
    }

    Ok(token)
}

/// 접근 제어 미들웨어.
///
/// 실패는 모두 해당 요청에서 종료되며 핸들러는 실행되지 않습니다.
pub async fn access_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(route) = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
    else {
        error!(path = %request.uri().path(), "Access middleware installed without a matched route");
        let err = AuthError::Internal("route template unavailable".into());
        record_access_decision("unmatched", err.code());
        return err.into_response();
    };

    let span = access_span!(route);

    async move {
        let decision = authorize(&state, request.headers(), &route).await;
        match decision {
            Ok(identity) => {
                record_access_decision(&route, "forwarded");
                debug!(
                    identity_id = identity.identity_id,
                    role_id = identity.role_id,
                    "Request forwarded"
                );
                request.extensions_mut().insert(identity);
                next.run(request).await
            }
            Err(err) => {
                record_access_decision(&route, err.code());
                err.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// 헤더와 라우트 템플릿으로 요청 식별 정보를 결정.
async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    route: &str,
) -> Result<RequestIdentity, AuthError> {
    let token = extract_bearer(headers).inspect_err(|e| {
        warn!(route, reason = e.code(), "Rejected request without usable bearer token");
    })?;

    let claims = state.tokens.validate(token).map_err(|e| {
        let err = AuthError::from(e);
        warn!(route, reason = err.code(), "Rejected invalid token");
        err
    })?;
    let identity_id = claims.identity_id;

    let role_id = state.permissions.resolve_role(identity_id, route).await?;

    if !state.permissions.has_permission(role_id, route).await? {
        warn!(identity_id, route, role_id, "Permission denied");
        return Err(AuthError::PermissionDenied);
    }

    Ok(RequestIdentity {
        identity_id,
        role_id,
    })
}

/// 인가를 통과한 요청의 식별 정보 추출기.
///
/// 접근 제어 미들웨어 뒤의 핸들러에서만 사용할 수 있습니다.
/// 미들웨어 없이 사용하면 500을 반환합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authenticated(pub RequestIdentity);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestIdentity>()
            .copied()
            .map(Authenticated)
            .ok_or_else(|| {
                error!("RequestIdentity missing from request extensions");
                AuthError::Internal("request identity missing".into())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{HeaderValue, Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Json, Router,
    };
    use tower::ServiceExt;

    use crate::state::TestStateBuilder;

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            extract_bearer(&headers),
            Err(AuthError::AuthHeaderMissing)
        ));

        for bad in ["Token abc", "bearer abc", "Bearer", "Bearer ", "Bearer a b", "Basic dXNlcg=="] {
            headers.insert(AUTHORIZATION, HeaderValue::from_static(bad));
            assert!(
                matches!(extract_bearer(&headers), Err(AuthError::MalformedAuthHeader)),
                "{bad:?} should be malformed"
            );
        }

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer(&headers).unwrap(), "abc.def.ghi");
    }

    async fn whoami(Authenticated(identity): Authenticated) -> Json<RequestIdentity> {
        Json(identity)
    }

    #[tokio::test]
    async fn test_extractor_without_middleware_is_internal_error() {
        let app: Router = Router::new().route("/whoami", get(whoami));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_middleware_uses_route_template() {
        let built = TestStateBuilder::new()
            .role(2, "nurse")
            .identity("alice", "Password1", 1001, true, &[2])
            .grant("/records/{id}", 2)
            .build();
        let token = built.state.tokens.issue(1001).unwrap();

        let app = Router::new()
            .route("/records/{id}", get(whoami))
            .route_layer(middleware::from_fn_with_state(
                built.state.clone(),
                access_middleware,
            ))
            .with_state(built.state.clone());

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/records/42")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unmatched_request_fails_closed() {
        let built = TestStateBuilder::new()
            .role(2, "nurse")
            .identity("alice", "Password1", 1001, true, &[2])
            .build();
        let token = built.state.tokens.issue(1001).unwrap();

        // fallback에는 라우트 템플릿이 없다
        let app = Router::new()
            .fallback(whoami)
            .layer(middleware::from_fn_with_state(
                built.state.clone(),
                access_middleware,
            ))
            .with_state(built.state.clone());

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/anything")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(built.store.role_lookups(), 0);
    }
}
