//! 저장소 협력자 에러 타입.
//!
//! 인증 코어는 저장소를 인터페이스로만 사용하므로,
//! 구현체(Postgres, 인메모리)가 공통으로 반환하는 에러를 여기서 정의합니다.

use thiserror::Error;

/// 저장소 조회/기록 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 데이터베이스 에러 (연결 실패, 쿼리 실패 등)
    #[error("데이터베이스 에러: {0}")]
    Database(String),

    /// 유일성 제약 위반 (중복 사용자명 등)
    #[error("중복 데이터: {0}")]
    Conflict(String),

    /// 존재하지 않는 참조 (없는 역할 ID 등)
    #[error("참조 대상이 없습니다: {0}")]
    InvalidReference(String),

    /// 저장소가 설정되지 않음 (DATABASE_URL 미설정)
    #[error("저장소가 설정되지 않았습니다")]
    NotConfigured,
}

/// 저장소 작업을 위한 Result 타입.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// 유일성 제약 위반인지 확인합니다.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    /// 존재하지 않는 대상을 참조한 입력인지 확인합니다.
    pub fn is_invalid_reference(&self) -> bool {
        matches!(self, StoreError::InvalidReference(_))
    }
}

#[cfg(feature = "sqlx-support")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        // 23505 = unique_violation, 23503 = foreign_key_violation
        if let sqlx::Error::Database(ref db_err) = err {
            match db_err.code().as_deref() {
                Some("23505") => return StoreError::Conflict(db_err.message().to_string()),
                Some("23503") => {
                    return StoreError::InvalidReference(db_err.message().to_string())
                }
                _ => {}
            }
        }
        StoreError::Database(err.to_string())
    }
}
