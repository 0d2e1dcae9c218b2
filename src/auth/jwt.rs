//! Access and refresh tokens.
//!
//! Access: `{userId, role, tokenVersion, iat, exp}`. Refresh:
//! `{userId, tokenVersion, iat, exp}`. Both HS256, each with its own secret.
//! A token is only honoured while its `tokenVersion` equals the user's.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::config::JwtConfig;
use crate::domain::aggregates::{Role, User};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub user_id: Uuid,
    pub role: Role,
    pub token_version: u32,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClaims {
    pub user_id: Uuid,
    pub token_version: u32,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(cfg.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(cfg.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            access_ttl: cfg.access_ttl,
            refresh_ttl: cfg.refresh_ttl,
        }
    }

    pub fn issue(&self, user: &User) -> Result<TokenPair, AuthError> {
        let iat = Utc::now().timestamp();
        let access = AccessClaims {
            user_id: user.id(), role: user.role(), token_version: user.token_version(),
            iat, exp: iat + self.access_ttl.num_seconds(),
        };
        let refresh = RefreshClaims {
            user_id: user.id(), token_version: user.token_version(), iat, exp: iat + self.refresh_ttl.num_seconds(),
        };
        Ok(TokenPair {
            access_token: encode(&Header::new(Algorithm::HS256), &access, &self.access_encoding)?,
            refresh_token: encode(&Header::new(Algorithm::HS256), &refresh, &self.refresh_encoding)?,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        decode::<AccessClaims>(token, &self.access_decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(access_ttl: Duration) -> TokenIssuer {
        TokenIssuer::new(&JwtConfig {
            access_secret: "access-secret".into(), refresh_secret: "refresh-secret".into(),
            access_ttl, refresh_ttl: Duration::days(7),
        })
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = issuer(Duration::minutes(15));
        let user = User::register("Asha", "asha@example.com", "hash".into(), Role::Admin);
        let pair = issuer.issue(&user).unwrap();
        let claims = issuer.verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.user_id, user.id());
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(issuer.verify_refresh(&pair.refresh_token).unwrap().token_version, 0);
    }

    #[test]
    fn test_tokens_are_not_interchangeable() {
        let issuer = issuer(Duration::minutes(15));
        let user = User::register("Asha", "asha@example.com", "hash".into(), Role::User);
        let pair = issuer.issue(&user).unwrap();
        assert!(issuer.verify_access(&pair.refresh_token).is_err());
        assert!(issuer.verify_refresh(&pair.access_token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = issuer(Duration::minutes(-10));
        let user = User::register("Asha", "asha@example.com", "hash".into(), Role::User);
        let pair = issuer.issue(&user).unwrap();
        assert!(matches!(issuer.verify_access(&pair.access_token), Err(AuthError::InvalidToken)));
    }
}
