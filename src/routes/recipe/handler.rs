use axum::{
    Json,
    extract::{Extension, Query, State},
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use validator::Validate;

use crate::{
    AppState,
    database::{RecipeFilter, UserEntity},
    error::{AppError, AppResult},
    messages::Message,
    result::{ApiResponse, Reply},
    utils::Page,
};

use super::model::{
    self, RecipeCreateRequest, RecipeDetail, RecipeEditRequest, RecipeListQuery, RecipeSummary,
    RecipeUuidQuery,
};

#[axum::debug_handler]
pub async fn create(
    Extension(user): Extension<UserEntity>,
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RecipeCreateRequest>, AppError>,
) -> AppResult<Reply<()>> {
    req.validate()?;

    let recipe = model::create(&state, &user, req).await?;

    let message = Message::CreateRecipe {
        title: &recipe.title,
        user: &user.phone_number,
    };
    let response =
        ApiResponse::message(message).with_metadata(json!({ "recipe_uuid": recipe.uuid }));
    Ok(Reply::created(response).logged(&state.log))
}

#[axum::debug_handler]
pub async fn update(
    Extension(user): Extension<UserEntity>,
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RecipeEditRequest>, AppError>,
) -> AppResult<Reply<()>> {
    req.validate()?;

    let uuid = req.uuid.to_string();
    model::update(&state, &user, req).await?;

    let message = Message::UpdateRecipe {
        uuid: &uuid,
        user: &user.phone_number,
    };
    Ok(Reply::accepted(ApiResponse::message(message)).logged(&state.log))
}

#[axum::debug_handler]
pub async fn delete(
    Extension(user): Extension<UserEntity>,
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<RecipeUuidQuery>, AppError>,
) -> AppResult<Reply<()>> {
    model::delete(&state, &user, query.recipe_uuid).await?;

    let uuid = query.recipe_uuid.to_string();
    let message = Message::DeleteRecipe {
        uuid: &uuid,
        user: &user.phone_number,
    };
    Ok(Reply::accepted(ApiResponse::message(message)).logged(&state.log))
}

#[axum::debug_handler]
pub async fn show_all(
    State(state): State<AppState>,
    WithRejection(Query(page), _): WithRejection<Query<Page>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<RecipeListQuery>, AppError>,
) -> AppResult<Reply<RecipeSummary>> {
    page.validate()?;

    let recipes = model::show_all(&state, RecipeFilter::from(query), page).await?;
    Ok(Reply::ok(ApiResponse::list(recipes)).logged(&state.log))
}

#[axum::debug_handler]
pub async fn show_detail(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<RecipeUuidQuery>, AppError>,
) -> AppResult<Reply<RecipeDetail>> {
    let recipe = model::show_detail(&state, query.recipe_uuid).await?;
    Ok(Reply::ok(ApiResponse::query(recipe)).logged(&state.log))
}
