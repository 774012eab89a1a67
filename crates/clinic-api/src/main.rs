//! 클리닉 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다.
//! 로그인, 헬스 체크, 메트릭, 접근 제어가 적용된 `/api/*` 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, middleware, routing::get, Router};
use clinic_core::{init_logging, AppConfig, CorsConfig, DatabaseConfig, LogConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use clinic_api::metrics::setup_metrics_recorder;
use clinic_api::middleware::{metrics_layer, LoginThrottle};
use clinic_api::openapi::openapi_router;
use clinic_api::routes::create_api_router;
use clinic_api::state::AppState;

/// 로그인 시도 버킷 정리 간격.
const THROTTLE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// 데이터베이스 연결 풀 생성.
///
/// 풀은 지연 연결로 생성되므로 시작 시 데이터베이스가 내려가 있어도 서버는 뜹니다.
/// 그동안 저장소 조회는 실패하고 보호된 라우트는 500, readiness는 503으로 응답합니다.
async fn create_db_pool(config: &DatabaseConfig) -> anyhow::Result<Option<sqlx::PgPool>> {
    let Some(url) = config.url.as_deref() else {
        warn!("database.url not set, every storage read will fail (fail-closed)");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
        .connect_lazy(url)
        .context("invalid database.url")?;

    match sqlx::query("SELECT 1").fetch_one(&pool).await {
        Ok(_) => info!("Connected to PostgreSQL successfully"),
        Err(e) => error!(error = %e, "Database is not reachable yet"),
    }

    Ok(Some(pool))
}

/// CORS 레이어 생성.
///
/// `cors.allowed_origins`가 비어 있으면 모든 origin을 허용합니다 (개발 모드).
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .allowed_origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let restricted = !origins.is_empty();
    let allow_origin = if restricted {
        info!("CORS configured with {} allowed origins", origins.len());
        AllowOrigin::list(origins)
    } else {
        if !config.allowed_origins.is_empty() {
            warn!("cors.allowed_origins contains no valid origins, allowing any");
        } else {
            warn!("cors.allowed_origins not set, allowing any origin (development mode)");
        }
        AllowOrigin::any()
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        // wildcard origin과 credentials는 함께 쓸 수 없다
        .allow_credentials(restricted)
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(
    state: Arc<AppState>,
    throttle: LoginThrottle,
    metrics_handle: PrometheusHandle,
    cors: &CorsConfig,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    // 도메인 CRUD 라우트는 별도 서비스가 이 라우터에 `downstream`으로 연결한다
    let api_router = create_api_router(state.clone(), throttle, Router::new()).with_state(state);

    Router::new()
        .merge(metrics_router)
        .merge(api_router)
        .merge(openapi_router())
        // 메트릭 미들웨어 (모든 요청에 적용)
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 (30초) - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer(cors))
}

/// OpenAPI 스펙 내보내기 처리.
///
/// `--export-openapi` 플래그가 있으면 스펙을 stdout으로 출력하고 `true`를 반환합니다.
fn handle_export_openapi() -> anyhow::Result<bool> {
    use clinic_api::openapi::ApiDoc;
    use utoipa::OpenApi as _;

    if !std::env::args().any(|arg| arg == "--export-openapi") {
        return Ok(false);
    }

    let json = serde_json::to_string_pretty(&ApiDoc::openapi())?;
    println!("{}", json);

    Ok(true)
}

/// 유휴 로그인 시도 버킷 정리 태스크.
fn spawn_throttle_cleanup(throttle: LoginThrottle, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(THROTTLE_CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => throttle.cleanup().await,
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    if handle_export_openapi()? {
        return Ok(());
    }

    let config = AppConfig::load_default().context("failed to load configuration")?;

    init_logging(LogConfig::from(&config.logging))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    info!("Starting Clinic API server...");

    let metrics_handle = setup_metrics_recorder()?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = config.server.bind_address().parse().with_context(|| {
        format!(
            "invalid server address {}; check server.host and server.port",
            config.server.bind_address()
        )
    })?;

    let pool = create_db_pool(&config.database).await?;
    let state = Arc::new(AppState::from_config(&config.auth, pool));
    info!(
        token_ttl_minutes = config.auth.token_ttl_minutes,
        database = state.has_db(),
        "Authentication configured"
    );

    let throttle = LoginThrottle::new(config.login_throttle.clone());
    info!(
        requests_per_minute = config.login_throttle.requests_per_minute,
        burst_size = config.login_throttle.burst_size,
        "Login throttling configured"
    );

    let shutdown_token = CancellationToken::new();
    spawn_throttle_cleanup(throttle.clone(), shutdown_token.clone());

    let app = create_router(state, throttle, metrics_handle, &config.cors);

    info!(%addr, "API server listening");
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
    .await?;

    shutdown_token.cancel();
    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
}
