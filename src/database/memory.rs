use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AccessTokenRecord, DbResult, LogEntry, LogRepository, NewRecipe, NewUser, RecipeChanges,
    RecipeEntity, RecipeFilter, RecipeRepository, RelationRepository, Tag, TagRepository,
    TokenRepository, UserChanges, UserEntity, UserFilter, UserRepository,
};
use crate::utils::Page;

#[derive(Debug, Clone)]
struct StoredRecipe {
    id: i64,
    uuid: Uuid,
    user_id: i64,
    title: String,
    content: String,
    is_active: bool,
    created_at: chrono::DateTime<Utc>,
    tags: BTreeSet<Tag>,
}

#[derive(Default)]
struct State {
    next_user_id: i64,
    next_recipe_id: i64,
    users: Vec<UserEntity>,
    recipes: Vec<StoredRecipe>,
    // (follower_id, following_id)，按关注顺序保存
    relations: Vec<(i64, i64)>,
    tokens: Vec<AccessTokenRecord>,
    logs: Vec<LogEntry>,
}

impl State {
    fn user(&self, id: i64) -> Option<&UserEntity> {
        self.users.iter().find(|u| u.id == id)
    }

    fn join(&self, recipe: &StoredRecipe) -> Option<RecipeEntity> {
        let owner = self.user(recipe.user_id)?;
        Some(RecipeEntity {
            id: recipe.id,
            uuid: recipe.uuid,
            user_id: recipe.user_id,
            owner_phone_number: owner.phone_number.clone(),
            owner_email: owner.email.clone(),
            title: recipe.title.clone(),
            content: recipe.content.clone(),
            is_active: recipe.is_active,
            created_at: recipe.created_at,
            tags: recipe.tags.iter().copied().collect(),
        })
    }
}

/// 进程内存储，用于本地开发和测试
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn unique_violation(what: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("duplicate key value violates unique constraint on {}", what))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写入的日志，测试中用于断言
    pub async fn log_entries(&self) -> Vec<LogEntry> {
        self.state.lock().await.logs.clone()
    }

    pub async fn token_records(&self, user_id: i64) -> Vec<AccessTokenRecord> {
        self.state
            .lock()
            .await
            .tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> DbResult<Option<UserEntity>> {
        Ok(self.state.lock().await.user(id).cloned())
    }

    async fn find_by_phone(&self, phone_number: &str) -> DbResult<Option<UserEntity>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.phone_number == phone_number)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> DbResult<UserEntity> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.phone_number == user.phone_number) {
            return Err(unique_violation("users.phone_number"));
        }

        state.next_user_id += 1;
        let created = UserEntity {
            id: state.next_user_id,
            phone_number: user.phone_number,
            email: user.email,
            gender: None,
            is_online: user.is_online,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn set_online(&self, id: i64, online: bool) -> DbResult<()> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.iter_mut().find(|u| u.id == id) {
            user.is_online = online;
        }
        Ok(())
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> DbResult<UserEntity> {
        let mut state = self.state.lock().await;
        if let Some(phone) = &changes.phone_number {
            if state
                .users
                .iter()
                .any(|u| u.id != id && &u.phone_number == phone)
            {
                return Err(unique_violation("users.phone_number"));
            }
        }

        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(sqlx::Error::RowNotFound)?;
        if let Some(phone) = &changes.phone_number {
            user.phone_number = phone.clone();
        }
        if let Some(email) = &changes.email {
            user.email = Some(email.clone());
        }
        if let Some(gender) = changes.gender {
            user.gender = Some(gender);
        }
        if let Some(hash) = &changes.password_hash {
            user.password_hash = hash.clone();
        }
        Ok(user.clone())
    }

    async fn search(&self, filter: &UserFilter, page: &Page) -> DbResult<(Vec<UserEntity>, u64)> {
        let state = self.state.lock().await;
        let matched: Vec<UserEntity> = state
            .users
            .iter()
            .filter(|u| match &filter.search {
                Some(search) => {
                    contains_ignore_case(&u.phone_number, search)
                        || u.email
                            .as_deref()
                            .is_some_and(|email| contains_ignore_case(email, search))
                }
                None => true,
            })
            .filter(|u| filter.gender.is_none_or(|g| u.gender == Some(g)))
            .filter(|u| filter.is_online.is_none_or(|online| u.is_online == online))
            .cloned()
            .collect();

        Ok((page.slice(&matched), matched.len() as u64))
    }
}

#[async_trait]
impl RecipeRepository for MemoryStore {
    async fn create(&self, recipe: NewRecipe) -> DbResult<RecipeEntity> {
        let mut state = self.state.lock().await;
        if state.user(recipe.user_id).is_none() {
            return Err(sqlx::Error::Protocol(
                "insert on recipes violates foreign key constraint on user_id".to_string(),
            ));
        }

        state.next_recipe_id += 1;
        let stored = StoredRecipe {
            id: state.next_recipe_id,
            uuid: Uuid::new_v4(),
            user_id: recipe.user_id,
            title: recipe.title,
            content: recipe.content,
            is_active: recipe.is_active,
            created_at: Utc::now(),
            tags: recipe.tags.into_iter().collect(),
        };
        let entity = state.join(&stored).ok_or(sqlx::Error::RowNotFound)?;
        state.recipes.push(stored);
        Ok(entity)
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> DbResult<Option<RecipeEntity>> {
        let state = self.state.lock().await;
        Ok(state
            .recipes
            .iter()
            .find(|r| r.uuid == uuid)
            .and_then(|r| state.join(r)))
    }

    async fn update(&self, uuid: Uuid, changes: &RecipeChanges) -> DbResult<bool> {
        let mut state = self.state.lock().await;
        let Some(recipe) = state.recipes.iter_mut().find(|r| r.uuid == uuid) else {
            return Ok(false);
        };

        if let Some(title) = &changes.title {
            recipe.title = title.clone();
        }
        if let Some(content) = &changes.content {
            recipe.content = content.clone();
        }
        if let Some(is_active) = changes.is_active {
            recipe.is_active = is_active;
        }
        if let Some(tags) = &changes.tags {
            recipe.tags = tags.iter().copied().collect();
        }
        Ok(true)
    }

    async fn delete(&self, uuid: Uuid) -> DbResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.recipes.len();
        state.recipes.retain(|r| r.uuid != uuid);
        Ok(state.recipes.len() < before)
    }

    async fn search(&self, filter: &RecipeFilter, page: &Page) -> DbResult<(Vec<RecipeEntity>, u64)> {
        let state = self.state.lock().await;
        let matched: Vec<RecipeEntity> = state
            .recipes
            .iter()
            .filter(|r| match &filter.search {
                Some(search) => {
                    contains_ignore_case(&r.title, search) || contains_ignore_case(&r.content, search)
                }
                None => true,
            })
            .filter(|r| filter.is_active.is_none_or(|active| r.is_active == active))
            .filter_map(|r| state.join(r))
            .collect();

        Ok((page.slice(&matched), matched.len() as u64))
    }

    async fn uuids_by_user(&self, user_id: i64) -> DbResult<Vec<Uuid>> {
        let state = self.state.lock().await;
        Ok(state
            .recipes
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.uuid)
            .collect())
    }
}

#[async_trait]
impl TagRepository for MemoryStore {
    async fn list(&self, page: &Page) -> DbResult<(Vec<Tag>, u64)> {
        Ok((page.slice(&Tag::ALL), Tag::ALL.len() as u64))
    }
}

impl MemoryStore {
    async fn relation_page(
        &self,
        user_id: i64,
        page: &Page,
        follower_side: bool,
    ) -> DbResult<(Vec<UserEntity>, u64)> {
        let state = self.state.lock().await;
        let users: Vec<UserEntity> = state
            .relations
            .iter()
            .filter_map(|&(follower, following)| {
                if follower_side && following == user_id {
                    state.user(follower).cloned()
                } else if !follower_side && follower == user_id {
                    state.user(following).cloned()
                } else {
                    None
                }
            })
            .collect();

        Ok((page.slice(&users), users.len() as u64))
    }
}

#[async_trait]
impl RelationRepository for MemoryStore {
    async fn follow(&self, follower_id: i64, following_id: i64) -> DbResult<bool> {
        let mut state = self.state.lock().await;
        if state.relations.contains(&(follower_id, following_id)) {
            return Ok(false);
        }
        state.relations.push((follower_id, following_id));
        Ok(true)
    }

    async fn unfollow(&self, follower_id: i64, following_id: i64) -> DbResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.relations.len();
        state
            .relations
            .retain(|&pair| pair != (follower_id, following_id));
        Ok(state.relations.len() < before)
    }

    async fn followers(&self, user_id: i64, page: &Page) -> DbResult<(Vec<UserEntity>, u64)> {
        self.relation_page(user_id, page, true).await
    }

    async fn following(&self, user_id: i64, page: &Page) -> DbResult<(Vec<UserEntity>, u64)> {
        self.relation_page(user_id, page, false).await
    }
}

#[async_trait]
impl TokenRepository for MemoryStore {
    async fn insert(&self, record: &AccessTokenRecord) -> DbResult<()> {
        self.state.lock().await.tokens.push(record.clone());
        Ok(())
    }

    async fn take(&self, user_id: i64, refresh_token: &str) -> DbResult<bool> {
        let mut state = self.state.lock().await;
        let position = state
            .tokens
            .iter()
            .position(|t| t.user_id == user_id && t.refresh_token == refresh_token);
        match position {
            Some(index) => {
                state.tokens.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_for_user(&self, user_id: i64) -> DbResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.tokens.len();
        state.tokens.retain(|t| t.user_id != user_id);
        Ok((before - state.tokens.len()) as u64)
    }
}

#[async_trait]
impl LogRepository for MemoryStore {
    async fn insert(&self, entry: &LogEntry) -> DbResult<()> {
        self.state.lock().await.logs.push(entry.clone());
        Ok(())
    }
}
