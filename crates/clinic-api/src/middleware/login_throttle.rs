//! 로그인 시도 제한 middleware.
//!
//! 클라이언트 IP별 Token Bucket으로 `POST /login` 시도 횟수를 제한합니다.
//! 비밀번호 대입 공격을 늦추기 위한 것이며, 보호된 라우트에는 적용하지 않습니다.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use clinic_core::LoginThrottleConfig;
use metrics::counter;
use tokio::sync::RwLock;

use crate::auth::AuthError;

/// Token Bucket 구조체.
#[derive(Debug)]
struct TokenBucket {
    /// 현재 토큰 수
    tokens: f64,
    /// 마지막 리필 시간
    last_refill: Instant,
    /// 최대 토큰 수 (버킷 용량)
    max_tokens: f64,
    /// 초당 리필되는 토큰 수
    refill_rate: f64,
}

impl TokenBucket {
    fn new(config: &LoginThrottleConfig) -> Self {
        let refill_rate = config.requests_per_minute as f64 / 60.0;
        let max_tokens = refill_rate + config.burst_size as f64;

        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// 토큰 소비 시도.
    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// 다음 토큰까지 대기 시간 (초, 최소 1).
    fn retry_after_secs(&self) -> u64 {
        if self.refill_rate <= 0.0 {
            return 60;
        }
        ((1.0 - self.tokens) / self.refill_rate).ceil().max(1.0) as u64
    }
}

/// 시도 제한 확인 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// 허용
    Allowed,
    /// 제한 초과
    Limited {
        /// 재시도까지 대기 시간 (초)
        retry_after: u64,
    },
}

/// 로그인 시도 제한기.
///
/// 복제본은 같은 버킷을 공유합니다.
#[derive(Clone)]
pub struct LoginThrottle {
    config: LoginThrottleConfig,
    buckets: Arc<RwLock<HashMap<IpAddr, TokenBucket>>>,
    idle_after: Duration,
}

impl LoginThrottle {
    pub fn new(config: LoginThrottleConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(RwLock::new(HashMap::new())),
            idle_after: Duration::from_secs(300),
        }
    }

    /// 유휴 버킷 정리 기준 시간 설정.
    pub fn with_idle_after(mut self, idle_after: Duration) -> Self {
        self.idle_after = idle_after;
        self
    }

    /// 시도 허용 여부 확인.
    pub async fn check(&self, ip: IpAddr) -> ThrottleDecision {
        let mut buckets = self.buckets.write().await;

        let bucket = buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(&self.config));

        if bucket.try_acquire() {
            ThrottleDecision::Allowed
        } else {
            ThrottleDecision::Limited {
                retry_after: bucket.retry_after_secs(),
            }
        }
    }

    /// 오래 사용되지 않은 버킷 정리.
    pub async fn cleanup(&self) {
        let mut buckets = self.buckets.write().await;
        let idle_after = self.idle_after;

        buckets.retain(|_, bucket| bucket.last_refill.elapsed() < idle_after);
    }

    /// 현재 추적 중인 IP 수.
    pub async fn tracked_ips(&self) -> usize {
        self.buckets.read().await.len()
    }
}

/// 로그인 시도 제한 미들웨어.
pub async fn login_throttle_middleware(
    State(throttle): State<LoginThrottle>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request, throttle.config.trust_forwarded_headers);

    match throttle.check(ip).await {
        ThrottleDecision::Allowed => {
            counter!("login_throttle_requests_total", "status" => "allowed").increment(1);
            next.run(request).await
        }
        ThrottleDecision::Limited { retry_after } => {
            counter!("login_throttle_requests_total", "status" => "limited").increment(1);
            tracing::warn!(client_ip = %ip, retry_after, "Login attempts throttled");

            AuthError::TooManyRequests { retry_after }.into_response()
        }
    }
}

/// 요청에서 클라이언트 IP 추출.
///
/// 기본적으로 소켓 주소만 사용합니다. 프록시 뒤에서 `trust_forwarded_headers`가
/// 켜진 경우에만 X-Forwarded-For, X-Real-IP 헤더를 먼저 확인합니다.
fn client_ip(request: &Request, trust_forwarded_headers: bool) -> IpAddr {
    let socket = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if !trust_forwarded_headers {
        return socket.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or(socket)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::RETRY_AFTER, Request as HttpRequest, StatusCode},
        middleware,
        routing::post,
        Router,
    };
    use tower::ServiceExt;

    fn config(requests_per_minute: u32, burst_size: u32) -> LoginThrottleConfig {
        LoginThrottleConfig {
            requests_per_minute,
            burst_size,
            trust_forwarded_headers: false,
        }
    }

    fn login_app(config: LoginThrottleConfig) -> (Router, LoginThrottle) {
        let throttle = LoginThrottle::new(config);
        let app = Router::new()
            .route("/login", post(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(
                throttle.clone(),
                login_throttle_middleware,
            ));
        (app, throttle)
    }

    fn login_from(socket: &str, forwarded_for: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().method("POST").uri("/login");
        if let Some(forwarded_for) = forwarded_for {
            builder = builder.header("x-forwarded-for", forwarded_for);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(socket.parse::<SocketAddr>().unwrap()));
        request
    }

    #[tokio::test]
    async fn test_throttle_limits_burst() {
        let throttle = LoginThrottle::new(config(60, 5));
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        // 1 (초당) + 5 (버스트) = 6
        for i in 0..6 {
            assert_eq!(
                throttle.check(ip).await,
                ThrottleDecision::Allowed,
                "attempt {i} should be allowed"
            );
        }

        assert!(matches!(
            throttle.check(ip).await,
            ThrottleDecision::Limited { retry_after } if retry_after >= 1
        ));
    }

    #[tokio::test]
    async fn test_throttle_is_per_ip() {
        let throttle = LoginThrottle::new(config(60, 0));
        let ip1: IpAddr = "192.168.1.1".parse().unwrap();
        let ip2: IpAddr = "192.168.1.2".parse().unwrap();

        assert_eq!(throttle.check(ip1).await, ThrottleDecision::Allowed);
        assert!(matches!(
            throttle.check(ip1).await,
            ThrottleDecision::Limited { .. }
        ));
        assert_eq!(throttle.check(ip2).await, ThrottleDecision::Allowed);
    }

    #[tokio::test]
    async fn test_cleanup_removes_idle_buckets() {
        let throttle =
            LoginThrottle::new(config(60, 0)).with_idle_after(Duration::from_millis(10));
        let _ = throttle.check("10.0.0.1".parse().unwrap()).await;
        assert_eq!(throttle.tracked_ips().await, 1);

        tokio::time::sleep(Duration::from_millis(20)).await;

        throttle.cleanup().await;
        assert_eq!(throttle.tracked_ips().await, 0);
    }

    #[tokio::test]
    async fn test_middleware_returns_429_with_retry_after() {
        let (app, _) = login_app(config(60, 0));

        let first = app
            .clone()
            .oneshot(login_from("203.0.113.9:50000", None))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(login_from("203.0.113.9:50001", None))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key(RETRY_AFTER));
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_does_not_bypass_limit() {
        let (app, throttle) = login_app(config(60, 0));

        let mut allowed = 0;
        for i in 0..20 {
            let forwarded = format!("10.1.{}.{}", i / 250, i % 250);
            let response = app
                .clone()
                .oneshot(login_from("198.51.100.7:40000", Some(&forwarded)))
                .await
                .unwrap();
            if response.status() == StatusCode::OK {
                allowed += 1;
            } else {
                assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
            }
        }

        assert_eq!(allowed, 1);
        assert_eq!(throttle.tracked_ips().await, 1);
    }

    #[tokio::test]
    async fn test_forwarded_headers_used_when_trusted() {
        let (app, throttle) = login_app(LoginThrottleConfig {
            trust_forwarded_headers: true,
            ..config(60, 0)
        });

        for client in ["203.0.113.1", "203.0.113.2"] {
            let response = app
                .clone()
                .oneshot(login_from("10.0.0.1:40000", Some(client)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(throttle.tracked_ips().await, 2);
    }

    #[test]
    fn test_client_ip_precedence() {
        let request = HttpRequest::builder()
            .header("x-forwarded-for", "203.0.113.9")
            .header("x-real-ip", "198.51.100.4")
            .body(Body::empty())
            .unwrap();
        // 신뢰하지 않으면 헤더를 무시한다
        assert_eq!(client_ip(&request, false), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(
            client_ip(&request, true),
            "203.0.113.9".parse::<IpAddr>().unwrap()
        );

        let request = HttpRequest::builder()
            .header("x-real-ip", "198.51.100.4")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            client_ip(&request, true),
            "198.51.100.4".parse::<IpAddr>().unwrap()
        );

        let request = login_from("192.0.2.10:1234", Some("203.0.113.9"));
        assert_eq!(
            client_ip(&request, false),
            "192.0.2.10".parse::<IpAddr>().unwrap()
        );
    }
}
