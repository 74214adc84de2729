pub mod recipe;
pub mod relation;
pub mod tag;
pub mod user;

use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    messages::WELCOME,
    middleware::{RateLimiter, auth_middleware, log_errors, rate_limit},
    result::ApiResponse,
};

/// Ping响应
#[derive(Serialize)]
pub struct PingResponse {
    pub status: String,
    pub timestamp: i64,
}

pub async fn index() -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::query(WELCOME)))
}

/// 健康检查接口
pub async fn ping() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }),
    )
}

/// 组装全部路由和中间件
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();
    let limits_enabled = config.rate_limit_enabled();

    // 设置限流器
    let default_limiter = RateLimiter::new(
        state.cache_store.clone(),
        "default",
        config.rate_limit_default.clone(),
        limits_enabled,
    );
    let recipes_limiter = RateLimiter::new(
        state.cache_store.clone(),
        "recipes",
        config.rate_limit_recipes.clone(),
        limits_enabled,
    );

    let auth = axum::middleware::from_fn_with_state(state.clone(), auth_middleware);

    // 将路由分为公开路由和受保护路由
    let public_routes = Router::new()
        .route("/", get(index))
        .route("/ping", get(ping))
        .route("/user/login", post(user::login_create));

    let user_routes = Router::new()
        .route("/user/update", post(user::update))
        .route("/user/list", get(user::show_all))
        .route("/user/detail", get(user::show_detail))
        .route("/user/logout", get(user::logout))
        .route("/user/refreshToken", get(user::refresh))
        .layer(auth.clone());

    let recipe_routes = Router::new()
        .merge(
            Router::new()
                .route("/recipe/create", post(recipe::create))
                .route("/recipe/update", post(recipe::update))
                .route("/recipe/delete", post(recipe::delete))
                .layer(auth.clone()),
        )
        .route("/recipe/list", get(recipe::show_all))
        .route("/recipe/detail", get(recipe::show_detail))
        .route("/recipe/tags", get(tag::show_all))
        .layer(axum::middleware::from_fn_with_state(recipes_limiter, rate_limit));

    let relation_routes = Router::new()
        .route("/relation/follow", post(relation::follow))
        .route("/relation/unfollow", post(relation::unfollow))
        .route("/relation/follower_list", get(relation::follower_list))
        .route("/relation/following_list", get(relation::following_list))
        .layer(auth);

    let router = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(recipe_routes)
        .merge(relation_routes);

    // 添加日志中间件和限流中间件
    let router = router
        .layer(axum::middleware::from_fn_with_state(default_limiter, rate_limit))
        .layer(axum::middleware::from_fn_with_state(state.log.clone(), log_errors))
        .layer(TraceLayer::new_for_http());

    router.with_state(state)
}
