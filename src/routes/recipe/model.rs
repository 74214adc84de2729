use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    cache::keys,
    database::{NewRecipe, RecipeChanges, RecipeEntity, RecipeFilter, Tag, UserEntity},
    error::{AppError, AppResult},
    messages::{RECIPE_NOT_FOUND, RECIPE_NOT_OWNED},
    routes::{tag::TagView, user::UserSummary},
    utils::{
        Page, Paginated,
        validation::{validate_recipe_content, validate_recipe_title},
    },
};

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecipeCreateRequest {
    #[validate(custom(function = "validate_recipe_title"))]
    pub title: String,
    #[validate(custom(function = "validate_recipe_content"))]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// 菜谱修改，uuid 必填，其余字段可选
#[derive(Debug, Deserialize, Validate)]
pub struct RecipeEditRequest {
    pub uuid: Uuid,
    #[validate(custom(function = "validate_recipe_title"))]
    pub title: Option<String>,
    #[validate(custom(function = "validate_recipe_content"))]
    pub content: Option<String>,
    pub is_active: Option<bool>,
    pub tags: Option<Vec<Tag>>,
}

#[derive(Debug, Deserialize)]
pub struct RecipeUuidQuery {
    pub recipe_uuid: Uuid,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RecipeListQuery {
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

impl From<RecipeListQuery> for RecipeFilter {
    fn from(query: RecipeListQuery) -> Self {
        Self {
            search: query.search.filter(|s| !s.trim().is_empty()),
            is_active: query.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub uuid: Uuid,
    pub title: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDetail {
    pub uuid: Uuid,
    pub title: String,
    pub content: String,
    pub is_active: bool,
    pub user: UserSummary,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<TagView>,
}

fn owner(recipe: &RecipeEntity) -> UserSummary {
    UserSummary {
        phone_number: recipe.owner_phone_number.clone(),
        email: recipe.owner_email.clone(),
    }
}

impl From<RecipeEntity> for RecipeSummary {
    fn from(recipe: RecipeEntity) -> Self {
        Self {
            user: owner(&recipe),
            uuid: recipe.uuid,
            title: recipe.title,
        }
    }
}

impl From<RecipeEntity> for RecipeDetail {
    fn from(recipe: RecipeEntity) -> Self {
        Self {
            user: owner(&recipe),
            uuid: recipe.uuid,
            title: recipe.title,
            content: recipe.content,
            is_active: recipe.is_active,
            created_at: recipe.created_at,
            tags: recipe.tags.into_iter().map(TagView::from).collect(),
        }
    }
}

/// 菜谱必须属于当前用户
async fn ensure_owner(state: &AppState, user: &UserEntity, uuid: Uuid) -> AppResult<()> {
    match state.recipes.find_by_uuid(uuid).await? {
        Some(recipe) if recipe.user_id == user.id => Ok(()),
        _ => Err(AppError::bad_request(RECIPE_NOT_OWNED)),
    }
}

pub async fn create(
    state: &AppState,
    user: &UserEntity,
    req: RecipeCreateRequest,
) -> AppResult<RecipeEntity> {
    let new_recipe = NewRecipe {
        user_id: user.id,
        title: req.title,
        content: req.content,
        is_active: req.is_active,
        tags: req.tags,
    };

    state
        .cache
        .invalidating(&keys::RECIPE_WRITE_FAMILIES, async {
            Ok(state.recipes.create(new_recipe).await?)
        })
        .await
}

pub async fn update(state: &AppState, user: &UserEntity, req: RecipeEditRequest) -> AppResult<()> {
    ensure_owner(state, user, req.uuid).await?;

    let changes = RecipeChanges {
        title: req.title,
        content: req.content,
        is_active: req.is_active,
        tags: req.tags,
    };

    state
        .cache
        .invalidating(&keys::RECIPE_WRITE_FAMILIES, async {
            if !state.recipes.update(req.uuid, &changes).await? {
                return Err(AppError::bad_request(RECIPE_NOT_OWNED));
            }
            Ok(())
        })
        .await
}

pub async fn delete(state: &AppState, user: &UserEntity, uuid: Uuid) -> AppResult<()> {
    ensure_owner(state, user, uuid).await?;

    state
        .cache
        .invalidating(&keys::RECIPE_WRITE_FAMILIES, async {
            state.recipes.delete(uuid).await?;
            Ok(())
        })
        .await
}

pub async fn show_all(
    state: &AppState,
    filter: RecipeFilter,
    page: Page,
) -> AppResult<Paginated<RecipeSummary>> {
    state
        .cache
        .cached(keys::RECIPE_LIST, &(&filter, &page), None, async {
            let (recipes, total) = state.recipes.search(&filter, &page).await?;
            Ok(Paginated::new(recipes, total, &page).map(RecipeSummary::from))
        })
        .await
}

pub async fn show_detail(state: &AppState, uuid: Uuid) -> AppResult<RecipeDetail> {
    state
        .cache
        .cached(keys::RECIPE_DETAIL, &uuid, None, async {
            state
                .recipes
                .find_by_uuid(uuid)
                .await?
                .map(RecipeDetail::from)
                .ok_or_else(|| AppError::NotFound(RECIPE_NOT_FOUND.to_string()))
        })
        .await
}
