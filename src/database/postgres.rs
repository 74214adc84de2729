use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    AccessTokenRecord, DbResult, LogEntry, LogRepository, NewRecipe, NewUser, RecipeChanges,
    RecipeEntity, RecipeFilter, RecipeRepository, RelationRepository, Tag, TagRepository,
    TokenRepository, UserChanges, UserEntity, UserFilter, UserRepository,
};
use crate::utils::Page;

const USER_COLUMNS: &str =
    "u.id, u.phone_number, u.email, u.gender, u.is_online, u.password_hash, u.created_at";

const RECIPE_SELECT: &str = r#"
    SELECT
        r.id, r.uuid, r.user_id,
        u.phone_number AS owner_phone_number, u.email AS owner_email,
        r.title, r.content, r.is_active, r.created_at,
        COALESCE(
            ARRAY_AGG(t.title::text ORDER BY t.id) FILTER (WHERE t.id IS NOT NULL),
            '{}'
        ) AS tags
    FROM recipes r
    JOIN users u ON u.id = r.user_id
    LEFT JOIN recipe_tags rt ON rt.recipe_id = r.id
    LEFT JOIN tags t ON t.id = rt.tag_id
"#;

/// Postgres 存储实现
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct RecipeRow {
    id: i64,
    uuid: Uuid,
    user_id: i64,
    owner_phone_number: String,
    owner_email: Option<String>,
    title: String,
    content: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    tags: Vec<String>,
}

impl From<RecipeRow> for RecipeEntity {
    fn from(row: RecipeRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            user_id: row.user_id,
            owner_phone_number: row.owner_phone_number,
            owner_email: row.owner_email,
            title: row.title,
            content: row.content,
            is_active: row.is_active,
            created_at: row.created_at,
            tags: row.tags.iter().filter_map(|t| t.parse().ok()).collect(),
        }
    }
}

fn tag_names(tags: &[Tag]) -> Vec<String> {
    tags.iter().map(|t| t.as_str().to_string()).collect()
}

/// 子串匹配模式，输入中的 % _ \\ 按字面匹配
fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    qb.push(" WHERE TRUE");
    if let Some(search) = &filter.search {
        let pattern = contains_pattern(search);
        qb.push(" AND (u.phone_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(gender) = filter.gender {
        qb.push(" AND u.gender = ").push_bind(gender);
    }
    if let Some(is_online) = filter.is_online {
        qb.push(" AND u.is_online = ").push_bind(is_online);
    }
}

fn push_recipe_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &RecipeFilter) {
    qb.push(" WHERE TRUE");
    if let Some(search) = &filter.search {
        let pattern = contains_pattern(search);
        qb.push(" AND (r.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR r.content ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(is_active) = filter.is_active {
        qb.push(" AND r.is_active = ").push_bind(is_active);
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: &Page) {
    qb.push(" LIMIT ")
        .push_bind(page.limit() as i64)
        .push(" OFFSET ")
        .push_bind(page.offset() as i64);
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_by_id(&self, id: i64) -> DbResult<Option<UserEntity>> {
        let user = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {} FROM users u WHERE u.id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_phone(&self, phone_number: &str) -> DbResult<Option<UserEntity>> {
        let user = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {} FROM users u WHERE u.phone_number = $1",
            USER_COLUMNS
        ))
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, user: NewUser) -> DbResult<UserEntity> {
        let created = sqlx::query_as::<_, UserEntity>(
            r#"
            INSERT INTO users (phone_number, email, password_hash, is_online)
            VALUES ($1, $2, $3, $4)
            RETURNING id, phone_number, email, gender, is_online, password_hash, created_at
            "#,
        )
        .bind(&user.phone_number)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_online)
        .fetch_one(&self.pool)
        .await;

        match created {
            Ok(created) => {
                tracing::info!(user_id = created.id, "Created user");
                Ok(created)
            }
            Err(e) => {
                tracing::error!("Failed to create user: {:?}", e);
                Err(e)
            }
        }
    }

    async fn set_online(&self, id: i64, online: bool) -> DbResult<()> {
        sqlx::query("UPDATE users SET is_online = $2 WHERE id = $1")
            .bind(id)
            .bind(online)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> DbResult<UserEntity> {
        let user = sqlx::query_as::<_, UserEntity>(
            r#"
            UPDATE users
            SET phone_number = COALESCE($2, phone_number),
                email = COALESCE($3, email),
                gender = COALESCE($4, gender),
                password_hash = COALESCE($5, password_hash)
            WHERE id = $1
            RETURNING id, phone_number, email, gender, is_online, password_hash, created_at
            "#,
        )
        .bind(id)
        .bind(&changes.phone_number)
        .bind(&changes.email)
        .bind(changes.gender)
        .bind(&changes.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn search(&self, filter: &UserFilter, page: &Page) -> DbResult<(Vec<UserEntity>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users u");
        push_user_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM users u", USER_COLUMNS));
        push_user_filters(&mut select, filter);
        select.push(" ORDER BY u.id");
        push_page(&mut select, page);
        let users = select
            .build_query_as::<UserEntity>()
            .fetch_all(&self.pool)
            .await?;

        Ok((users, total as u64))
    }
}

#[async_trait]
impl RecipeRepository for PgStore {
    async fn create(&self, recipe: NewRecipe) -> DbResult<RecipeEntity> {
        let mut tx = self.pool.begin().await?;

        let (recipe_id, uuid): (i64, Uuid) = sqlx::query_as(
            r#"
            INSERT INTO recipes (uuid, user_id, title, content, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, uuid
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(recipe.user_id)
        .bind(&recipe.title)
        .bind(&recipe.content)
        .bind(recipe.is_active)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO recipe_tags (recipe_id, tag_id)
            SELECT $1, id FROM tags WHERE title::text = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(recipe_id)
        .bind(tag_names(&recipe.tags))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_by_uuid(uuid).await?.ok_or(sqlx::Error::RowNotFound)
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> DbResult<Option<RecipeEntity>> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "{} WHERE r.uuid = $1 GROUP BY r.id, u.id",
            RECIPE_SELECT
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RecipeEntity::from))
    }

    async fn update(&self, uuid: Uuid, changes: &RecipeChanges) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let recipe_id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE recipes
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                is_active = COALESCE($4, is_active)
            WHERE uuid = $1
            RETURNING id
            "#,
        )
        .bind(uuid)
        .bind(&changes.title)
        .bind(&changes.content)
        .bind(changes.is_active)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(recipe_id) = recipe_id else {
            return Ok(false);
        };

        if let Some(tags) = &changes.tags {
            sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
                .bind(recipe_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                r#"
                INSERT INTO recipe_tags (recipe_id, tag_id)
                SELECT $1, id FROM tags WHERE title::text = ANY($2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(recipe_id)
            .bind(tag_names(tags))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn delete(&self, uuid: Uuid) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn search(&self, filter: &RecipeFilter, page: &Page) -> DbResult<(Vec<RecipeEntity>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM recipes r");
        push_recipe_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(RECIPE_SELECT);
        push_recipe_filters(&mut select, filter);
        select.push(" GROUP BY r.id, u.id ORDER BY r.id");
        push_page(&mut select, page);
        let rows = select
            .build_query_as::<RecipeRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((rows.into_iter().map(RecipeEntity::from).collect(), total as u64))
    }

    async fn uuids_by_user(&self, user_id: i64) -> DbResult<Vec<Uuid>> {
        let uuids = sqlx::query_scalar("SELECT uuid FROM recipes WHERE user_id = $1 ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(uuids)
    }
}

#[async_trait]
impl TagRepository for PgStore {
    async fn list(&self, page: &Page) -> DbResult<(Vec<Tag>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
            .fetch_one(&self.pool)
            .await?;

        let tags = sqlx::query_scalar::<_, Tag>("SELECT title FROM tags ORDER BY id LIMIT $1 OFFSET $2")
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok((tags, total as u64))
    }
}

impl PgStore {
    /// follower_side 为 true 时查询关注 user_id 的人，否则查询 user_id 关注的人
    async fn relation_page(
        &self,
        user_id: i64,
        page: &Page,
        follower_side: bool,
    ) -> DbResult<(Vec<UserEntity>, u64)> {
        let (join_column, filter_column) = if follower_side {
            ("follower_id", "following_id")
        } else {
            ("following_id", "follower_id")
        };

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM relations WHERE {} = $1",
            filter_column
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let users = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            SELECT {columns}
            FROM relations rel
            JOIN users u ON u.id = rel.{join_column}
            WHERE rel.{filter_column} = $1
            ORDER BY rel.id
            LIMIT $2 OFFSET $3
            "#,
            columns = USER_COLUMNS,
            join_column = join_column,
            filter_column = filter_column,
        ))
        .bind(user_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((users, total as u64))
    }
}

#[async_trait]
impl RelationRepository for PgStore {
    async fn follow(&self, follower_id: i64, following_id: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO relations (follower_id, following_id)
            VALUES ($1, $2)
            ON CONFLICT (follower_id, following_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn unfollow(&self, follower_id: i64, following_id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM relations WHERE follower_id = $1 AND following_id = $2")
            .bind(follower_id)
            .bind(following_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn followers(&self, user_id: i64, page: &Page) -> DbResult<(Vec<UserEntity>, u64)> {
        self.relation_page(user_id, page, true).await
    }

    async fn following(&self, user_id: i64, page: &Page) -> DbResult<(Vec<UserEntity>, u64)> {
        self.relation_page(user_id, page, false).await
    }
}

#[async_trait]
impl TokenRepository for PgStore {
    async fn insert(&self, record: &AccessTokenRecord) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO access_tokens (user_id, refresh_token, refresh_token_expiration)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(record.user_id)
        .bind(&record.refresh_token)
        .bind(record.refresh_token_expiration)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn take(&self, user_id: i64, refresh_token: &str) -> DbResult<bool> {
        // 单条 DELETE，并发轮换时只有一个请求能删到记录
        let result =
            sqlx::query("DELETE FROM access_tokens WHERE user_id = $1 AND refresh_token = $2")
                .bind(user_id)
                .bind(refresh_token)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_user(&self, user_id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl LogRepository for PgStore {
    async fn insert(&self, entry: &LogEntry) -> DbResult<()> {
        sqlx::query("INSERT INTO log_entries (timestamp, level, message) VALUES ($1, $2, $3)")
            .bind(entry.timestamp)
            .bind(entry.level)
            .bind(sqlx::types::Json(&entry.message))
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
