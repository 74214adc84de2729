// 数据库模块
// 包含实体定义、存储库接口以及 Postgres / 内存两种实现

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::utils::Page;

pub use memory::MemoryStore;
pub use models::*;
pub use postgres::PgStore;

pub type DbResult<T> = Result<T, sqlx::Error>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> DbResult<Option<UserEntity>>;

    async fn find_by_phone(&self, phone_number: &str) -> DbResult<Option<UserEntity>>;

    async fn create(&self, user: NewUser) -> DbResult<UserEntity>;

    async fn set_online(&self, id: i64, online: bool) -> DbResult<()>;

    /// 只写入 changes 中给出的字段
    async fn update(&self, id: i64, changes: &UserChanges) -> DbResult<UserEntity>;

    /// 返回当前页和总条数
    async fn search(&self, filter: &UserFilter, page: &Page) -> DbResult<(Vec<UserEntity>, u64)>;
}

#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// 菜谱和标签关联在同一事务内写入
    async fn create(&self, recipe: NewRecipe) -> DbResult<RecipeEntity>;

    async fn find_by_uuid(&self, uuid: Uuid) -> DbResult<Option<RecipeEntity>>;

    /// 记录不存在时返回 false
    async fn update(&self, uuid: Uuid, changes: &RecipeChanges) -> DbResult<bool>;

    async fn delete(&self, uuid: Uuid) -> DbResult<bool>;

    async fn search(&self, filter: &RecipeFilter, page: &Page) -> DbResult<(Vec<RecipeEntity>, u64)>;

    async fn uuids_by_user(&self, user_id: i64) -> DbResult<Vec<Uuid>>;
}

#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn list(&self, page: &Page) -> DbResult<(Vec<Tag>, u64)>;
}

#[async_trait]
pub trait RelationRepository: Send + Sync {
    /// 已关注时返回 false
    async fn follow(&self, follower_id: i64, following_id: i64) -> DbResult<bool>;

    async fn unfollow(&self, follower_id: i64, following_id: i64) -> DbResult<bool>;

    async fn followers(&self, user_id: i64, page: &Page) -> DbResult<(Vec<UserEntity>, u64)>;

    async fn following(&self, user_id: i64, page: &Page) -> DbResult<(Vec<UserEntity>, u64)>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn insert(&self, record: &AccessTokenRecord) -> DbResult<()>;

    /// 原子地删除该用户的这条刷新令牌，返回是否真的删除了记录
    async fn take(&self, user_id: i64, refresh_token: &str) -> DbResult<bool>;

    async fn delete_for_user(&self, user_id: i64) -> DbResult<u64>;
}

#[async_trait]
pub trait LogRepository: Send + Sync {
    async fn insert(&self, entry: &LogEntry) -> DbResult<()>;
}
