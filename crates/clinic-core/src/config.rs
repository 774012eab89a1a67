//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//!
//! 로드 순서 (뒤에 오는 것이 우선):
//! 1. 내장 기본값
//! 2. TOML 파일 (`config/default.toml`, 없어도 됨)
//! 3. `CLINIC__` 접두사 환경 변수 (예: `CLINIC__AUTH__JWT_SECRET`)

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// JWT 서명 키 최소 길이 (바이트).
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// 토큰 유효 시간 상한 (1년, 분 단위).
pub const MAX_TOKEN_TTL_MINUTES: i64 = 525_600;

/// 애플리케이션 설정.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 인증 설정 (서명 키는 필수)
    pub auth: AuthConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// CORS 설정
    #[serde(default)]
    pub cors: CorsConfig,
    /// 로그인 시도 제한 설정
    #[serde(default)]
    pub login_throttle: LoginThrottleConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// `host:port` 형식 주소 반환.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 연결 URL (없으면 저장소 비활성화)
    #[serde(default)]
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connection_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connection_timeout_secs: 10,
        }
    }
}

/// 인증 설정.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// HMAC 서명 키
    #[serde(deserialize_with = "deserialize_secret")]
    pub jwt_secret: SecretString,
    /// 토큰 유효 시간 (분)
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

fn default_token_ttl_minutes() -> i64 {
    60
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// CORS 설정.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// 허용 origin 목록 (비어 있으면 모든 origin 허용)
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// 로그인 시도 제한 설정 (클라이언트 IP별).
#[derive(Debug, Clone, Deserialize)]
pub struct LoginThrottleConfig {
    /// 분당 허용 시도 수
    pub requests_per_minute: u32,
    /// 버스트 허용량
    pub burst_size: u32,
    /// X-Forwarded-For / X-Real-IP 헤더 신뢰 여부 (신뢰할 수 있는 프록시 뒤에서만)
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

impl Default for LoginThrottleConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 30,
            burst_size: 5,
            trust_forwarded_headers: false,
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let builder = Self::builder()?
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("CLINIC")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins"),
            );

        Self::finish(builder)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load("config/default.toml")
    }

    /// TOML 문자열에서 설정을 로드합니다 (환경 변수 무시).
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let builder = Self::builder()?.add_source(config::File::from_str(toml, FileFormat::Toml));
        Self::finish(builder)
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.connection_timeout_secs", 10)?
            .set_default("auth.token_ttl_minutes", 60)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("login_throttle.requests_per_minute", 30)?
            .set_default("login_throttle.burst_size", 5)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 로드된 설정 검증.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.expose_secret().len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Message(format!(
                "auth.jwt_secret must be at least {} bytes",
                MIN_JWT_SECRET_LEN
            )));
        }
        if self.auth.token_ttl_minutes <= 0 {
            return Err(ConfigError::Message(
                "auth.token_ttl_minutes must be positive".to_string(),
            ));
        }
        if self.auth.token_ttl_minutes > MAX_TOKEN_TTL_MINUTES {
            return Err(ConfigError::Message(format!(
                "auth.token_ttl_minutes must be at most {}",
                MAX_TOKEN_TTL_MINUTES
            )));
        }
        Ok(())
    }
}
