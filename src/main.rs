use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use recipe_hub::{
    AppState,
    cache::{CacheStore, MemoryCacheStore, RedisCacheStore},
    config::{Config, StorageBackend},
    database::{MemoryStore, PgStore},
    logger::EventLog,
    routes,
};
use serde_json::json;
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 缓存和限流使用同一个键值存储
    let cache_store: Arc<dyn CacheStore> = if config.debug {
        tracing::info!("Debug mode: using in-process cache store");
        Arc::new(MemoryCacheStore::new())
    } else {
        let redis_client =
            redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
        Arc::new(RedisCacheStore::new(Arc::new(redis_client)))
    };

    // 设置存储后端和应用状态
    let (state, log_writer) = match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .after_connect(|conn, _meta| {
                    Box::pin(async move {
                        conn.execute("SET application_name = 'recipe_hub';").await?;
                        Ok(())
                    })
                })
                .connect(&config.database_url)
                .await
                .expect("Failed to connect to Postgres");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("Failed to run database migrations");

            let store = Arc::new(PgStore::new(pool));
            let (log, writer) = EventLog::spawn(store.clone());
            (AppState::new(store, cache_store, config.clone(), log), writer)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-process storage, data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            let (log, writer) = EventLog::spawn(store.clone());
            (AppState::new(store, cache_store, config.clone(), log), writer)
        }
    };

    state.log.info(json!({ "data": "Application initialized" }));

    let router = routes::create_router(state.clone());

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        // 设置开发环境的CORS，允许所有来源
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    })
    .await
    .expect("Failed to start server");

    // 释放所有日志发送端后等待写入任务清空队列
    drop(state);
    match tokio::time::timeout(Duration::from_secs(5), log_writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Event log writer failed: {}", e),
        Err(_) => tracing::warn!("Timed out waiting for event log writer"),
    }
}
