use serde::Deserialize;

use crate::{
    AppState,
    cache::keys,
    database::UserEntity,
    error::{AppError, AppResult},
    messages::{ALREADY_FOLLOWING, FOLLOWING_IS_SELF, FOLLOWING_NOT_FOUND, NOT_FOLLOWING},
    routes::user::UserSummary,
    utils::{Page, Paginated},
};

#[derive(Debug, Deserialize)]
pub struct FollowQuery {
    pub following_phone_number: String,
}

async fn find_target(state: &AppState, phone_number: &str) -> AppResult<UserEntity> {
    state
        .users
        .find_by_phone(phone_number)
        .await?
        .ok_or_else(|| AppError::bad_request(FOLLOWING_NOT_FOUND))
}

pub async fn follow(state: &AppState, user: &UserEntity, following_phone_number: &str) -> AppResult<()> {
    let target = find_target(state, following_phone_number).await?;
    if target.id == user.id {
        return Err(AppError::bad_request(FOLLOWING_IS_SELF));
    }

    state
        .cache
        .invalidating(&keys::RELATION_FAMILIES, async {
            // 唯一约束兜底并发重复关注
            if !state.relations.follow(user.id, target.id).await? {
                return Err(AppError::bad_request(ALREADY_FOLLOWING));
            }
            Ok(())
        })
        .await
}

pub async fn unfollow(
    state: &AppState,
    user: &UserEntity,
    following_phone_number: &str,
) -> AppResult<()> {
    let target = find_target(state, following_phone_number).await?;

    state
        .cache
        .invalidating(&keys::RELATION_FAMILIES, async {
            if !state.relations.unfollow(user.id, target.id).await? {
                return Err(AppError::bad_request(NOT_FOLLOWING));
            }
            Ok(())
        })
        .await
}

pub async fn follower_list(
    state: &AppState,
    user: &UserEntity,
    page: Page,
) -> AppResult<Paginated<UserSummary>> {
    state
        .cache
        .cached(keys::USER_FOLLOWER_LIST, &(user.id, &page), None, async {
            let (users, total) = state.relations.followers(user.id, &page).await?;
            Ok(Paginated::new(users, total, &page).map(UserSummary::from))
        })
        .await
}

pub async fn following_list(
    state: &AppState,
    user: &UserEntity,
    page: Page,
) -> AppResult<Paginated<UserSummary>> {
    state
        .cache
        .cached(keys::USER_FOLLOWING_LIST, &(user.id, &page), None, async {
            let (users, total) = state.relations.following(user.id, &page).await?;
            Ok(Paginated::new(users, total, &page).map(UserSummary::from))
        })
        .await
}
