//! # Clinic Core
//!
//! 병원 관리 백엔드의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 백엔드 전반에서 사용되는 기본 타입을 제공합니다:
//! - 사용자 식별 정보(Identity) 및 계정 상태
//! - 역할(Role)과 라우트 권한(RoutePermission)
//! - 요청 범위 식별 정보(RequestIdentity)
//! - 저장소 협력자 인터페이스 (IdentityStore, PermissionStore)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
