use axum::Json;
use axum::{
    extract::rejection::{FormRejection, JsonRejection, QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

/// 认证相关错误，统一映射为 401
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("Invalid Credentials.")]
    InvalidCredentials,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Invalid Credentials.")]
    InvalidToken,
    #[error("Token Expired.")]
    TokenExpired,
    #[error("Invalid refresh token")]
    InvalidRefreshToken,
}

/// 单个字段的校验失败信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub error_type: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("{0}")]
    BadRequest(String),
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    NotFound(String),
    #[error("Rate limit exceeded: {limit} per {window}")]
    RateLimited {
        limit: u64,
        remaining: u64,
        window: String,
        reset_at: i64,
        retry_after: u64,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),
    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Credential(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 渲染统一的错误响应体
    pub fn body(&self) -> serde_json::Value {
        match self {
            AppError::Credential(e) => json!({ "msg": e.to_string(), "type": "Credential Exception" }),
            AppError::BadRequest(msg) => json!({ "msg": msg, "type": "Bad Request Exception" }),
            AppError::Validation(details) => json!({ "detail": details }),
            AppError::NotFound(msg) => json!({ "msg": msg, "type": "Not Found" }),
            AppError::RateLimited { .. } => json!({ "error": self.to_string() }),
            // 具体原因只写日志
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                json!({ "msg": "Internal Server Error", "type": "Internal Server Error" })
            }
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match self {
            AppError::Credential(_) => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("JWT"));
            }
            AppError::RateLimited {
                limit,
                remaining,
                reset_at,
                retry_after,
                ..
            } => {
                headers.insert("x-ratelimit-limit", HeaderValue::from(*limit));
                headers.insert("x-ratelimit-remaining", HeaderValue::from(*remaining));
                headers.insert("x-ratelimit-reset", HeaderValue::from(*reset_at));
                headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
            }
            _ => {}
        }
        headers
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter()
                    .map(|e| FieldError {
                        loc: vec![field.clone()],
                        msg: e
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("invalid value for {}", field)),
                        error_type: e.code.to_string(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        // HashMap 无序，排序保证输出稳定
        details.sort_by(|a, b| a.loc.cmp(&b.loc));
        AppError::Validation(details)
    }
}

impl AppError {
    fn unparsable(location: &str, reason: String) -> Self {
        AppError::Validation(vec![FieldError {
            loc: vec![location.to_string()],
            msg: reason,
            error_type: "value_error".to_string(),
        }])
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::unparsable("body", rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::unparsable("body", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::unparsable("query", rejection.body_text())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("password hashing failed: {}", e))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        AppError::Internal(format!("token signing failed: {}", e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, self.headers(), Json(self.body())).into_response()
    }
}
