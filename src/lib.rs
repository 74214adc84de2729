use std::sync::Arc;

use config::Config;
use database::{
    LogRepository, RecipeRepository, RelationRepository, TagRepository, TokenRepository,
    UserRepository,
};

pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod logger;
pub mod messages;
pub mod middleware;
pub mod result;
pub mod utils;

pub mod routes;

use auth::TokenService;
use cache::{Cache, CacheStore};
use logger::EventLog;

/// 存储后端需要实现的全部仓库接口
pub trait Store:
    UserRepository
    + RecipeRepository
    + TagRepository
    + RelationRepository
    + TokenRepository
    + LogRepository
    + 'static
{
}

impl<T> Store for T where
    T: UserRepository
        + RecipeRepository
        + TagRepository
        + RelationRepository
        + TokenRepository
        + LogRepository
        + 'static
{
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserRepository>,
    pub recipes: Arc<dyn RecipeRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub relations: Arc<dyn RelationRepository>,
    pub tokens: TokenService,
    pub cache: Cache,
    pub cache_store: Arc<dyn CacheStore>,
    pub log: EventLog,
}

impl AppState {
    pub fn new<S: Store>(
        store: Arc<S>,
        cache_store: Arc<dyn CacheStore>,
        config: Config,
        log: EventLog,
    ) -> Self {
        let tokens = TokenService::new(store.clone(), &config);
        let cache = Cache::new(cache_store.clone(), &config, log.clone());

        Self {
            config: Arc::new(config),
            users: store.clone(),
            recipes: store.clone(),
            tags: store.clone(),
            relations: store,
            tokens,
            cache,
            cache_store,
            log,
        }
    }
}
