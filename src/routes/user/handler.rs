use axum::{
    Form, Json,
    extract::{Extension, Query, State},
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use validator::Validate;

use crate::{
    AppState,
    database::{UserEntity, UserFilter},
    error::{AppError, AppResult},
    messages::Message,
    result::{ApiResponse, Reply},
    utils::Page,
};

use super::model::{
    self, LoginForm, RefreshQuery, UserDetail, UserEditRequest, UserListQuery, UserSummary,
};

#[axum::debug_handler]
pub async fn login_create(
    State(state): State<AppState>,
    WithRejection(Form(form), _): WithRejection<Form<LoginForm>, AppError>,
) -> AppResult<Reply<()>> {
    form.validate()?;

    match model::login_create(&state, &form).await {
        Ok(tokens) => {
            let message = Message::LoginUser {
                user: &form.username,
            };
            Ok(Reply::created(ApiResponse::with_token(message, tokens)).logged(&state.log))
        }
        Err(e) => {
            if matches!(e, AppError::Credential(_)) {
                state.log.warning(json!({
                    "message": Message::FailedLoginUser { user: &form.username }.to_string(),
                }));
            }
            Err(e)
        }
    }
}

#[axum::debug_handler]
pub async fn update(
    Extension(user): Extension<UserEntity>,
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<UserEditRequest>, AppError>,
) -> AppResult<Reply<()>> {
    let patch = req.normalized();
    patch.validate()?;

    model::update(&state, &user, patch).await?;

    let message = Message::UpdateUser {
        user: &user.phone_number,
    };
    Ok(Reply::accepted(ApiResponse::message(message)).logged(&state.log))
}

#[axum::debug_handler]
pub async fn show_all(
    Extension(_user): Extension<UserEntity>,
    State(state): State<AppState>,
    WithRejection(Query(page), _): WithRejection<Query<Page>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<UserListQuery>, AppError>,
) -> AppResult<Reply<UserSummary>> {
    page.validate()?;

    let users = model::show_all(&state, UserFilter::from(query), page).await?;
    Ok(Reply::ok(ApiResponse::list(users)).logged(&state.log))
}

#[axum::debug_handler]
pub async fn show_detail(
    Extension(user): Extension<UserEntity>,
    State(state): State<AppState>,
) -> AppResult<Reply<UserDetail>> {
    let detail = model::show_detail(&state, &user).await?;
    Ok(Reply::ok(ApiResponse::query(detail)).logged(&state.log))
}

#[axum::debug_handler]
pub async fn logout(
    Extension(user): Extension<UserEntity>,
    State(state): State<AppState>,
) -> AppResult<Reply<()>> {
    model::logout(&state, &user).await?;

    let message = Message::LogoutUser {
        user: &user.phone_number,
    };
    Ok(Reply::ok(ApiResponse::message(message)).logged(&state.log))
}

#[axum::debug_handler]
pub async fn refresh(
    Extension(user): Extension<UserEntity>,
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<RefreshQuery>, AppError>,
) -> AppResult<Reply<()>> {
    let tokens = model::refresh(&state, &user, &query.refresh_token).await?;

    let message = Message::RefreshToken {
        user: &user.phone_number,
    };
    Ok(Reply::ok(ApiResponse::with_token(message, tokens)).logged(&state.log))
}
