use axum::extract::{Query, State};
use axum_extra::extract::WithRejection;
use validator::Validate;

use crate::{
    AppState,
    error::{AppError, AppResult},
    result::{ApiResponse, Reply},
    utils::Page,
};

use super::model::{self, TagView};

#[axum::debug_handler]
pub async fn show_all(
    State(state): State<AppState>,
    WithRejection(Query(page), _): WithRejection<Query<Page>, AppError>,
) -> AppResult<Reply<TagView>> {
    page.validate()?;

    let tags = model::show_all(&state, page).await?;
    Ok(Reply::ok(ApiResponse::list(tags)).logged(&state.log))
}
