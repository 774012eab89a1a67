//! Access control repository (PostgreSQL).
//!
//! `user_table`, `roles`, `user_roles`, `api_permissions` 테이블을 읽어
//! 인증/인가 저장소 인터페이스를 구현합니다.

use async_trait::async_trait;
use chrono::Utc;
use clinic_core::{
    AccountStatus, Identity, IdentityId, IdentityStore, NewIdentity, PermissionStore, Role,
    RoleId, StoreResult,
};
use sqlx::{FromRow, PgPool};

// ================================================================================================
// Types
// ================================================================================================

/// 사용자 + 대표 역할 조회 결과.
#[derive(Debug, Clone, FromRow)]
struct IdentityRow {
    id: i32,
    username: String,
    password: String,
    user_id: i32,
    status: i16,
    #[sqlx(default)]
    role_id: Option<i32>,
    #[sqlx(default)]
    role_name: Option<String>,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        let role = match (row.role_id, row.role_name) {
            (Some(role_id), Some(role_name)) => Some(Role::new(role_id, role_name)),
            _ => None,
        };

        Identity {
            internal_id: row.id,
            username: row.username,
            password_hash: row.password,
            user_id: row.user_id,
            status: AccountStatus::from_code(row.status),
            role,
        }
    }
}

// ================================================================================================
// Queries
// ================================================================================================

/// 사용자명으로 조회. 역할이 여러 개면 가장 작은 역할 ID를 대표로 사용합니다.
const FIND_BY_USERNAME: &str = r#"
    SELECT u.id, u.username, u.password, u.user_id, u.status, r.role_id, r.role_name
    FROM user_table u
    LEFT JOIN LATERAL (
        SELECT ro.role_id, ro.role_name
        FROM user_roles ur
        JOIN roles ro ON ro.role_id = ur.role_id
        WHERE ur.user_id = u.user_id
        ORDER BY ro.role_id
        LIMIT 1
    ) r ON TRUE
    WHERE u.username = $1
"#;

/// 라우트 권한이 있는 역할 우선, 없으면 가장 작은 역할 ID.
const FIND_ROLE_FOR_ROUTE: &str = r#"
    SELECT ur.role_id
    FROM user_roles ur
    JOIN user_table u ON u.user_id = ur.user_id
    WHERE u.user_id = $1
    ORDER BY EXISTS (
        SELECT 1 FROM api_permissions ap
        WHERE ap.role_id = ur.role_id AND ap.route_path = $2
    ) DESC, ur.role_id ASC
    LIMIT 1
"#;

const COUNT_ROUTE_PERMISSIONS: &str = r#"
    SELECT COUNT(*) FROM api_permissions
    WHERE route_path = $1 AND role_id = $2
"#;

// ================================================================================================
// Repository
// ================================================================================================

/// PostgreSQL 접근 제어 저장소.
///
/// 조회 결과를 캐싱하지 않습니다.
#[derive(Clone)]
pub struct PgAccessRepository {
    pool: PgPool,
}

impl PgAccessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgAccessRepository {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(FIND_BY_USERNAME)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Identity::from))
    }

    async fn create(&self, identity: NewIdentity) -> StoreResult<Identity> {
        let mut tx = self.pool.begin().await?;

        let internal_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO user_table (username, password, user_id, status, createdat)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .bind(identity.user_id)
        .bind(identity.status.code())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let role = match identity.role_id {
            Some(role_id) => {
                sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
                    .bind(identity.user_id)
                    .bind(role_id)
                    .execute(&mut *tx)
                    .await?;

                let role_name: String =
                    sqlx::query_scalar("SELECT role_name FROM roles WHERE role_id = $1")
                        .bind(role_id)
                        .fetch_one(&mut *tx)
                        .await?;

                Some(Role::new(role_id, role_name))
            }
            None => None,
        };

        tx.commit().await?;

        Ok(Identity {
            internal_id,
            username: identity.username,
            password_hash: identity.password_hash,
            user_id: identity.user_id,
            status: identity.status,
            role,
        })
    }
}

#[async_trait]
impl PermissionStore for PgAccessRepository {
    async fn find_role_for_route(
        &self,
        identity_id: IdentityId,
        route_path: &str,
    ) -> StoreResult<Option<RoleId>> {
        let role_id = sqlx::query_scalar::<_, i32>(FIND_ROLE_FOR_ROUTE)
            .bind(identity_id)
            .bind(route_path)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role_id)
    }

    async fn count_route_permissions(&self, role_id: RoleId, route_path: &str) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(COUNT_ROUTE_PERMISSIONS)
            .bind(route_path)
            .bind(role_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_row_conversion() {
        let row = IdentityRow {
            id: 7,
            username: "alice".to_string(),
            password: "$argon2id$...".to_string(),
            user_id: 1001,
            status: 1,
            role_id: Some(2),
            role_name: Some("nurse".to_string()),
        };

        let identity = Identity::from(row);
        assert_eq!(identity.internal_id, 7);
        assert!(identity.is_active());
        assert_eq!(identity.role, Some(Role::new(2, "nurse")));
    }

    #[test]
    fn test_identity_row_without_role() {
        let row = IdentityRow {
            id: 8,
            username: "bob".to_string(),
            password: "hash".to_string(),
            user_id: 1002,
            status: 0,
            role_id: None,
            role_name: None,
        };

        let identity = Identity::from(row);
        assert!(!identity.is_active());
        assert!(identity.role.is_none());
    }
}
