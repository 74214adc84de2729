use axum::extract::{Extension, Query, State};
use axum_extra::extract::WithRejection;
use validator::Validate;

use crate::{
    AppState,
    database::UserEntity,
    error::{AppError, AppResult},
    messages::Message,
    result::{ApiResponse, Reply},
    routes::user::UserSummary,
    utils::Page,
};

use super::model::{self, FollowQuery};

#[axum::debug_handler]
pub async fn follow(
    Extension(user): Extension<UserEntity>,
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<FollowQuery>, AppError>,
) -> AppResult<Reply<()>> {
    model::follow(&state, &user, &query.following_phone_number).await?;

    let message = Message::FollowUser {
        user: &user.phone_number,
        following: &query.following_phone_number,
    };
    Ok(Reply::ok(ApiResponse::message(message)).logged(&state.log))
}

#[axum::debug_handler]
pub async fn unfollow(
    Extension(user): Extension<UserEntity>,
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<FollowQuery>, AppError>,
) -> AppResult<Reply<()>> {
    model::unfollow(&state, &user, &query.following_phone_number).await?;

    let message = Message::UnfollowUser {
        user: &user.phone_number,
        following: &query.following_phone_number,
    };
    Ok(Reply::ok(ApiResponse::message(message)).logged(&state.log))
}

#[axum::debug_handler]
pub async fn follower_list(
    Extension(user): Extension<UserEntity>,
    State(state): State<AppState>,
    WithRejection(Query(page), _): WithRejection<Query<Page>, AppError>,
) -> AppResult<Reply<UserSummary>> {
    page.validate()?;

    let followers = model::follower_list(&state, &user, page).await?;
    Ok(Reply::ok(ApiResponse::list(followers)).logged(&state.log))
}

#[axum::debug_handler]
pub async fn following_list(
    Extension(user): Extension<UserEntity>,
    State(state): State<AppState>,
    WithRejection(Query(page), _): WithRejection<Query<Page>, AppError>,
) -> AppResult<Reply<UserSummary>> {
    page.validate()?;

    let following = model::following_list(&state, &user, page).await?;
    Ok(Reply::ok(ApiResponse::list(following)).logged(&state.log))
}
