use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, Principal};
use crate::config::JwtConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims. Carry enough identity and role data that requests can be
/// authorized without touching the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account ID
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: String,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn into_principal(self) -> Result<Principal, AuthError> {
        let account_id = self
            .sub
            .parse::<i32>()
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(Principal {
            account_id,
            username: self.username,
            email: self.email,
            authorities: vec![self.role],
        })
    }
}

/// Access/refresh pair handed to the session transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

pub trait TokenIssuer: Send + Sync {
    fn issue_access_token(&self, principal: &Principal) -> Result<String, AuthError>;

    fn issue_refresh_token(&self, principal: &Principal) -> Result<String, AuthError>;

    /// Validate signature, expiry and token kind.
    fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError>;

    fn access_ttl_seconds(&self) -> i64;

    fn refresh_ttl_seconds(&self) -> i64;

    fn issue_pair(&self, principal: &Principal) -> Result<IssuedTokens, AuthError> {
        Ok(IssuedTokens {
            access_token: self.issue_access_token(principal)?,
            refresh_token: self.issue_refresh_token(principal)?,
            expires_in: self.access_ttl_seconds(),
        })
    }
}

/// HS256 issuer. Output is a pure function of principal, kind and issue time.
pub struct JwtTokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl JwtTokenIssuer {
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            access_ttl: config.access_ttl_seconds,
            refresh_ttl: config.refresh_ttl_seconds,
        }
    }

    pub fn issue_at(
        &self,
        principal: &Principal,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let iat = now.timestamp();

        let claims = Claims {
            sub: principal.subject(),
            username: principal.username.clone(),
            email: principal.email.clone(),
            role: principal
                .role()
                .ok_or_else(|| AuthError::Internal("Principal has no authority".to_string()))?
                .to_string(),
            typ: kind,
            iat,
            exp: iat + ttl,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {e}")))
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue_access_token(&self, principal: &Principal) -> Result<String, AuthError> {
        self.issue_at(principal, TokenKind::Access, Utc::now())
    }

    fn issue_refresh_token(&self, principal: &Principal) -> Result<String, AuthError> {
        self.issue_at(principal, TokenKind::Refresh, Utc::now())
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?;

        if claims.typ != kind {
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }

    fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl
    }

    fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::ROLE_STAFF;
    use chrono::TimeZone;

    fn issuer() -> JwtTokenIssuer {
        JwtTokenIssuer::new(&JwtConfig {
            secret: "unit-test-secret-that-is-long-enough".to_string(),
            ..JwtConfig::default()
        })
    }

    fn principal() -> Principal {
        Principal {
            account_id: 12,
            username: Some("line-cook".to_string()),
            email: None,
            authorities: vec![ROLE_STAFF.to_string()],
        }
    }

    #[test]
    fn access_token_round_trips_to_principal() {
        let issuer = issuer();
        let token = issuer.issue_access_token(&principal()).unwrap();

        let claims = issuer.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.role, ROLE_STAFF);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert_eq!(claims.into_principal().unwrap(), principal());
    }

    #[test]
    fn tokens_are_deterministic_per_principal_and_time() {
        let issuer = issuer();
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();

        let a = issuer.issue_at(&principal(), TokenKind::Access, at).unwrap();
        let b = issuer.issue_at(&principal(), TokenKind::Access, at).unwrap();
        let later = issuer
            .issue_at(&principal(), TokenKind::Access, at + chrono::Duration::seconds(1))
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, later);
    }

    #[test]
    fn refresh_token_is_not_accepted_as_access_token() {
        let issuer = issuer();
        let refresh = issuer.issue_refresh_token(&principal()).unwrap();

        assert!(matches!(
            issuer.verify(&refresh, TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
        assert!(issuer.verify(&refresh, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let issuer = issuer();
        let long_ago = Utc::now() - chrono::Duration::hours(2);
        let token = issuer
            .issue_at(&principal(), TokenKind::Access, long_ago)
            .unwrap();

        assert!(matches!(
            issuer.verify(&token, TokenKind::Access),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let other = JwtTokenIssuer::new(&JwtConfig {
            secret: "a-completely-different-secret-value".to_string(),
            ..JwtConfig::default()
        });
        let token = other.issue_access_token(&principal()).unwrap();

        assert!(matches!(
            issuer().verify(&token, TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            issuer().verify("not.a.jwt", TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn issue_pair_reports_access_lifetime() {
        let pair = issuer().issue_pair(&principal()).unwrap();
        assert_eq!(pair.expires_in, 900);
        assert_ne!(pair.access_token, pair.refresh_token);
    }
}
