//! JWT 토큰 발급/검증.
//!
//! HS256 서명 Bearer 토큰을 발급하고 검증합니다.
//! 서명 키는 생성 시 주입되며 프로세스 수명 동안 변경되지 않습니다.
//! 서버 측 상태(세션, 폐기 목록)는 없으며, 유효성은 서명과 만료 시간으로만 결정됩니다.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use clinic_core::{AuthConfig, IdentityId};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// 허용되는 유일한 서명 알고리즘.
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT 페이로드.
///
/// 스키마는 고정입니다. 필드가 없거나 타입이 다르면 디코딩 단계에서 거부됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - 외부 사용자 ID (10진수 문자열)
    pub sub: String,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// 현재 시각 기준으로 Claims 생성.
    ///
    /// 만료 시각이 표현 범위를 넘으면 `TokenError::TtlOutOfRange`.
    pub fn new(identity_id: IdentityId, ttl: Duration) -> Result<Self, TokenError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(TokenError::TtlOutOfRange)?;

        Ok(Self {
            sub: identity_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        })
    }

    /// 토큰이 만료되었는지 확인.
    ///
    /// `exp`가 현재 시각보다 커야 유효합니다.
    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }

    /// subject를 사용자 ID로 파싱.
    ///
    /// 부호나 공백이 섞인 값은 거부합니다.
    pub fn identity_id(&self) -> Result<IdentityId, TokenError> {
        if self.sub.is_empty() || !self.sub.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenError::Malformed);
        }
        self.sub.parse().map_err(|_| TokenError::Malformed)
    }
}

/// 검증을 통과한 토큰 정보.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedClaims {
    pub identity_id: IdentityId,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// 토큰 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("잘못된 토큰 형식")]
    Malformed,
    #[error("토큰 서명이 유효하지 않습니다")]
    SignatureInvalid,
    #[error("토큰이 만료되었습니다")]
    Expired,
    #[error("토큰 유효 시간이 허용 범위를 벗어났습니다")]
    TtlOutOfRange,
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

/// 토큰 서비스.
///
/// 순수 계산만 수행하므로 여러 요청에서 동시에 사용해도 안전합니다.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    /// 서명 키와 유효 시간으로 생성.
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let secret = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// 인증 설정에서 생성.
    ///
    /// 범위를 넘는 유효 시간은 최댓값으로 고정되며, 발급 시 `TtlOutOfRange`로 실패합니다.
    pub fn from_config(config: &AuthConfig) -> Self {
        let ttl = Duration::try_minutes(config.token_ttl_minutes).unwrap_or(Duration::MAX);
        Self::new(&config.jwt_secret, ttl)
    }

    /// 사용자 ID에 대한 토큰 발급.
    pub fn issue(&self, identity_id: IdentityId) -> Result<String, TokenError> {
        self.sign(&Claims::new(identity_id, self.ttl)?)
    }

    /// 주어진 Claims에 서명.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(TOKEN_ALGORITHM), claims, &self.encoding_key).map_err(TokenError::from)
    }

    /// 토큰 디코딩 및 검증.
    ///
    /// 서명(및 알고리즘) 검증 → Claims 스키마 검증 → 만료 검증 순서로 진행합니다.
    ///
    /// # Errors
    ///
    /// - `TokenError::Malformed`: 인코딩 또는 Claims 형식 오류
    /// - `TokenError::SignatureInvalid`: MAC 불일치 또는 예상하지 않은 알고리즘
    /// - `TokenError::Expired`: 만료 시각 경과
    pub fn validate(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        check_header_algorithm(token)?;

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::SignatureInvalid
                }
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            },
        )?;

        let claims = data.claims;
        let identity_id = claims.identity_id()?;
        if claims.is_expired() {
            return Err(TokenError::Expired);
        }

        Ok(VerifiedClaims {
            identity_id,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}

/// 헤더 `alg` 필드만 읽기 위한 구조체.
#[derive(Deserialize)]
struct RawHeader {
    alg: Option<String>,
}

/// 헤더에 선언된 알고리즘 확인.
///
/// `none`처럼 jsonwebtoken이 파싱하지 못하는 알고리즘도 서명 오류로 분류합니다.
/// 헤더 자체를 읽을 수 없으면 여기서는 통과시키고 디코딩 단계에서 Malformed로 처리됩니다.
fn check_header_algorithm(token: &str) -> Result<(), TokenError> {
    let Some(segment) = token.split('.').next() else {
        return Ok(());
    };
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(segment) else {
        return Ok(());
    };
    let Ok(header) = serde_json::from_slice::<RawHeader>(&bytes) else {
        return Ok(());
    };

    match header.alg.as_deref().map(str::parse::<Algorithm>) {
        Some(Ok(alg)) if alg == TOKEN_ALGORITHM => Ok(()),
        Some(_) => Err(TokenError::SignatureInvalid),
        None => Ok(()),
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &TOKEN_ALGORITHM)
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";
    const OTHER_SECRET: &str = "wrong-secret-key-for-testing-minimum-32-chars";

    fn service(secret: &str, ttl: Duration) -> TokenService {
        TokenService::new(&SecretString::from(secret.to_string()), ttl)
    }

    fn replace_signature(token: &str, signature: &str) -> String {
        let (head, _) = token.rsplit_once('.').unwrap();
        format!("{}.{}", head, signature)
    }

    #[test]
    fn test_issue_and_validate() {
        let tokens = service(TEST_SECRET, Duration::hours(1));
        let token = tokens.issue(1001).unwrap();

        assert_eq!(token.split('.').count(), 3);

        let claims = tokens.validate(&token).unwrap();
        assert_eq!(claims.identity_id, 1001);
        assert_eq!(claims.expires_at - claims.issued_at, 3600);
    }

    #[test]
    fn test_expires_after_ttl() {
        let tokens = service(TEST_SECRET, Duration::seconds(1));
        let token = tokens.issue(7).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(1100));

        assert!(matches!(tokens.validate(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_zero_ttl_is_already_expired() {
        let tokens = service(TEST_SECRET, Duration::zero());
        let token = tokens.issue(7).unwrap();

        assert!(matches!(tokens.validate(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_signed_token_with_past_expiry() {
        let tokens = service(TEST_SECRET, Duration::hours(1));
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "1001".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = tokens.sign(&claims).unwrap();

        assert!(matches!(tokens.validate(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_wrong_secret() {
        let token = service(TEST_SECRET, Duration::hours(1)).issue(1).unwrap();
        let result = service(OTHER_SECRET, Duration::hours(1)).validate(&token);

        assert!(matches!(result, Err(TokenError::SignatureInvalid)));
    }

    #[test]
    fn test_tampered_signature_never_accepted() {
        let tokens = service(TEST_SECRET, Duration::hours(1));
        let token = tokens.issue(1001).unwrap();
        let signature = token.rsplit('.').next().unwrap().to_string();

        for (i, original) in signature.char_indices() {
            let replacement = if original == 'A' { 'B' } else { 'A' };
            let mut tampered = signature.clone();
            tampered.replace_range(i..i + 1, &replacement.to_string());

            let result = tokens.validate(&replace_signature(&token, &tampered));
            assert!(
                matches!(result, Err(TokenError::SignatureInvalid)),
                "position {} accepted or misclassified: {:?}",
                i,
                result
            );
        }
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let tokens = service(TEST_SECRET, Duration::hours(1));
        let token = tokens.issue(1001).unwrap();
        let forged = tokens.issue(1).unwrap();

        // 다른 토큰의 payload를 붙여 넣으면 서명이 맞지 않음
        let parts: Vec<&str> = token.split('.').collect();
        let forged_parts: Vec<&str> = forged.split('.').collect();
        let spliced = format!("{}.{}.{}", parts[0], forged_parts[1], parts[2]);

        assert!(matches!(
            tokens.validate(&spliced),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_unexpected_algorithm_rejected() {
        let secret = TEST_SECRET.as_bytes();
        let claims = Claims::new(1001, Duration::hours(1)).unwrap();
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        let result = service(TEST_SECRET, Duration::hours(1)).validate(&token);
        assert!(matches!(result, Err(TokenError::SignatureInvalid)));
    }

    #[test]
    fn test_alg_none_is_signature_invalid() {
        let tokens = service(TEST_SECRET, Duration::hours(1));
        let valid = tokens.issue(1001).unwrap();
        let payload = valid.split('.').nth(1).unwrap();

        for header in [r#"{"alg":"none","typ":"JWT"}"#, r#"{"alg":"NONE"}"#, r#"{"alg":"HS999"}"#] {
            let unsigned = format!("{}.{}.", URL_SAFE_NO_PAD.encode(header), payload);
            let result = tokens.validate(&unsigned);

            assert!(
                matches!(result, Err(TokenError::SignatureInvalid)),
                "{header} gave {result:?}"
            );
        }

        // 서명만 제거한 HS256 토큰도 거부
        let (head, _) = valid.rsplit_once('.').unwrap();
        assert!(matches!(
            tokens.validate(&format!("{head}.")),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_oversized_ttl_fails_without_panic() {
        let tokens = service(TEST_SECRET, Duration::minutes(10_000_000_000_000));
        assert!(matches!(tokens.issue(1), Err(TokenError::TtlOutOfRange)));

        let auth = AuthConfig {
            jwt_secret: SecretString::from(TEST_SECRET.to_string()),
            token_ttl_minutes: i64::MAX,
        };
        let tokens = TokenService::from_config(&auth);
        assert!(matches!(tokens.issue(1), Err(TokenError::TtlOutOfRange)));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let tokens = service(TEST_SECRET, Duration::hours(1));

        assert!(matches!(tokens.validate(""), Err(TokenError::Malformed)));
        assert!(matches!(
            tokens.validate("not-a-token"),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(
            tokens.validate("invalid.token.here"),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_claim_shape_mismatch_is_malformed() {
        #[derive(Serialize)]
        struct NumericSubject {
            sub: i64,
            iat: i64,
            exp: i64,
        }

        #[derive(Serialize)]
        struct MissingSubject {
            user_id: i64,
            exp: i64,
        }

        let now = Utc::now().timestamp();
        let key = EncodingKey::from_secret(TEST_SECRET.as_bytes());
        let tokens = service(TEST_SECRET, Duration::hours(1));

        let numeric = encode(
            &Header::new(TOKEN_ALGORITHM),
            &NumericSubject {
                sub: 1001,
                iat: now,
                exp: now + 3600,
            },
            &key,
        )
        .unwrap();
        assert!(matches!(tokens.validate(&numeric), Err(TokenError::Malformed)));

        let missing = encode(
            &Header::new(TOKEN_ALGORITHM),
            &MissingSubject {
                user_id: 1001,
                exp: now + 3600,
            },
            &key,
        )
        .unwrap();
        assert!(matches!(tokens.validate(&missing), Err(TokenError::Malformed)));
    }

    #[test]
    fn test_non_numeric_subject_is_malformed() {
        let tokens = service(TEST_SECRET, Duration::hours(1));
        let now = Utc::now().timestamp();

        for sub in ["", "abc", "+5", "-5", " 5", "99999999999"] {
            let token = tokens
                .sign(&Claims {
                    sub: sub.to_string(),
                    iat: now,
                    exp: now + 3600,
                })
                .unwrap();
            assert!(
                matches!(tokens.validate(&token), Err(TokenError::Malformed)),
                "subject {:?} should be rejected",
                sub
            );
        }
    }

    #[test]
    fn test_debug_does_not_expose_keys() {
        let tokens = service(TEST_SECRET, Duration::hours(1));
        let debug = format!("{:?}", tokens);

        assert!(debug.contains("ttl_secs: 3600"));
        assert!(!debug.contains(TEST_SECRET));
    }
}
