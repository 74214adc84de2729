use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::auth::TokenPair;
use crate::logger::EventLog;
use crate::utils::Paginated;

/// 统一响应格式，由调用方显式选择
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiResponse<T = ()> {
    WithToken {
        message: String,
        access_token: String,
        refresh_token: String,
        token_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },
    Message {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },
    List {
        data: Vec<T>,
        page_count: u64,
        count: u64,
    },
    Query {
        data: T,
    },
}

impl<T> ApiResponse<T> {
    pub fn message(message: impl ToString) -> Self {
        ApiResponse::Message {
            message: message.to_string(),
            metadata: None,
        }
    }

    pub fn with_token(message: impl ToString, tokens: TokenPair) -> Self {
        ApiResponse::WithToken {
            message: message.to_string(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            metadata: None,
        }
    }

    pub fn query(data: T) -> Self {
        ApiResponse::Query { data }
    }

    pub fn list(page: Paginated<T>) -> Self {
        ApiResponse::List {
            data: page.data,
            page_count: page.page_count,
            count: page.count,
        }
    }

    /// 给 Message / WithToken 附加元数据，其他类型忽略
    pub fn with_metadata(mut self, value: Value) -> Self {
        match &mut self {
            ApiResponse::Message { metadata, .. } | ApiResponse::WithToken { metadata, .. } => {
                *metadata = Some(value);
            }
            ApiResponse::List { .. } | ApiResponse::Query { .. } => {}
        }
        self
    }

    /// 写入事件日志的摘要，不包含令牌和数据体
    pub fn summary(&self) -> Value {
        match self {
            ApiResponse::Message { message, metadata }
            | ApiResponse::WithToken {
                message, metadata, ..
            } => json!({ "message": message, "metadata": metadata }),
            ApiResponse::List {
                page_count, count, ..
            } => json!({ "message": "list", "page_count": page_count, "count": count }),
            ApiResponse::Query { .. } => json!({ "message": "query" }),
        }
    }
}

/// 带状态码的响应
#[derive(Debug)]
pub struct Reply<T>(pub StatusCode, pub ApiResponse<T>);

impl<T: Serialize> Reply<T> {
    pub fn ok(response: ApiResponse<T>) -> Self {
        Reply(StatusCode::OK, response)
    }

    pub fn created(response: ApiResponse<T>) -> Self {
        Reply(StatusCode::CREATED, response)
    }

    pub fn accepted(response: ApiResponse<T>) -> Self {
        Reply(StatusCode::ACCEPTED, response)
    }

    /// 记录到事件日志后返回自身
    pub fn logged(self, log: &EventLog) -> Self {
        let mut entry = self.1.summary();
        entry["status"] = json!(self.0.as_u16());
        log.info(entry);
        self
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}
