use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::{
    cache::CacheStore,
    config::RateLimitRule,
    error::{AppError, AppResult},
};

/// 固定窗口限流，每个路由组一个实例
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
    group: &'static str,
    rules: Arc<Vec<RateLimitRule>>,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn CacheStore>,
        group: &'static str,
        rules: Vec<RateLimitRule>,
        enabled: bool,
    ) -> Self {
        Self {
            store,
            group,
            rules: Arc::new(rules),
            enabled,
        }
    }

    /// 任一规则超限即拒绝
    pub async fn check(&self, ip: &str) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }

        for rule in self.rules.iter() {
            let window = rule.window.as_secs();
            let key = format!("rate_limit:{}:{}:{}", self.group, window, ip);
            let (count, ttl) = self.store.incr_window(&key, rule.window).await?;

            if count > rule.limit {
                tracing::warn!(
                    group = self.group,
                    ip = %ip,
                    limit = rule.limit,
                    window,
                    "Rate limit exceeded"
                );
                let rendered = rule.to_string();
                let window = rendered
                    .split_once(" per ")
                    .map(|(_, w)| w.to_string())
                    .unwrap_or(rendered);
                return Err(AppError::RateLimited {
                    limit: rule.limit,
                    remaining: 0,
                    window,
                    reset_at: Utc::now().timestamp() + ttl as i64,
                    retry_after: ttl,
                });
            }
        }
        Ok(())
    }
}

/// 客户端 IP：优先 x-real-ip，其次 x-forwarded-for，最后连接地址
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    let remote_ip = remote.map(|addr| addr.ip().to_string());
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let ip = client_ip(req.headers(), remote);

    limiter.check(&ip).await?;
    Ok(next.run(req).await)
}
