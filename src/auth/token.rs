use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::database::{AccessTokenRecord, TokenRepository};
use crate::error::{AppResult, CredentialError};

pub const TOKEN_TYPE: &str = "JWT";

/// 访问令牌载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,           // 用户ID
    pub exp: i64,              // 过期时间
    pub iat: i64,              // 签发时间
    pub refresh_token: String, // 同批签发的刷新令牌
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// 令牌服务：签发、校验、轮换与吊销
#[derive(Clone)]
pub struct TokenService {
    repo: Arc<dyn TokenRepository>,
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(repo: Arc<dyn TokenRepository>, config: &Config) -> Self {
        Self {
            repo,
            algorithm: config.jwt_algorithm,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_ttl: Duration::minutes(config.access_token_expire_minutes),
            refresh_ttl: Duration::minutes(config.refresh_token_expire_minutes),
        }
    }

    /// 覆盖有效期，负值可以生成已过期的令牌
    pub fn with_ttl(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation
    }

    pub async fn issue(&self, user_id: i64) -> AppResult<TokenPair> {
        let now = Utc::now();
        let header = Header::new(self.algorithm);
        let refresh_expiration = now + self.refresh_ttl;

        let refresh_token = encode(
            &header,
            &RefreshClaims {
                sub: user_id.to_string(),
                exp: refresh_expiration.timestamp(),
                iat: now.timestamp(),
                jti: Uuid::new_v4(),
            },
            &self.encoding_key,
        )?;

        let access_token = encode(
            &header,
            &AccessClaims {
                sub: user_id.to_string(),
                exp: (now + self.access_ttl).timestamp(),
                iat: now.timestamp(),
                refresh_token: refresh_token.clone(),
            },
            &self.encoding_key,
        )?;

        self.repo
            .insert(&AccessTokenRecord {
                user_id,
                refresh_token: refresh_token.clone(),
                refresh_token_expiration: refresh_expiration,
            })
            .await?;

        tracing::debug!(user_id, "Issued token pair");
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE.to_string(),
        })
    }

    /// 校验访问令牌并返回用户ID
    pub fn verify(&self, token: &str) -> Result<i64, CredentialError> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation()).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => CredentialError::TokenExpired,
                _ => CredentialError::InvalidToken,
            },
        )?;

        // 库的过期判断是严格小于，这里补上等于的情况
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(CredentialError::TokenExpired);
        }

        data.claims
            .sub
            .parse::<i64>()
            .map_err(|_| CredentialError::InvalidToken)
    }

    /// 用刷新令牌换一对新令牌，旧刷新令牌只能使用一次
    pub async fn rotate(&self, user_id: i64, refresh_token: &str) -> AppResult<TokenPair> {
        let data = decode::<RefreshClaims>(refresh_token, &self.decoding_key, &self.validation())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => CredentialError::TokenExpired,
                _ => CredentialError::InvalidRefreshToken,
            })?;

        if data.claims.exp <= Utc::now().timestamp() {
            return Err(CredentialError::TokenExpired.into());
        }
        if data.claims.sub != user_id.to_string() {
            return Err(CredentialError::InvalidRefreshToken.into());
        }

        if !self.repo.take(user_id, refresh_token).await? {
            tracing::warn!(user_id, "Refresh token reuse or unknown token");
            return Err(CredentialError::InvalidRefreshToken.into());
        }

        self.issue(user_id).await
    }

    /// 删除该用户的全部刷新令牌
    pub async fn revoke(&self, user_id: i64) -> AppResult<bool> {
        let removed = self.repo.delete_for_user(user_id).await?;
        tracing::debug!(user_id, removed, "Revoked tokens");
        Ok(true)
    }
}
