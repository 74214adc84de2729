use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use serde_json::{Value, json};
use tracing::error;

use crate::logger::EventLog;

const MAX_LOGGED_BODY: usize = 64 * 1024;

/// 错误响应写入事件日志，5xx 额外输出 tracing 错误
pub async fn log_errors(State(log): State<EventLog>, req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to read error response body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let body_value = serde_json::from_slice::<Value>(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

    if status.is_server_error() {
        error!(
            "Server error occurred - Status: {}, Body: {}",
            status, body_value
        );
    }
    log.error(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "status": status.as_u16(),
        "body": body_value,
    }));

    // 重置body以便重新构建响应
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
