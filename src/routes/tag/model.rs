use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    cache::keys,
    database::Tag,
    error::AppResult,
    utils::{Page, Paginated},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagView {
    pub title: Tag,
    pub display_title: String,
}

impl From<Tag> for TagView {
    fn from(tag: Tag) -> Self {
        Self {
            title: tag,
            display_title: tag.display_title().to_string(),
        }
    }
}

pub async fn show_all(state: &AppState, page: Page) -> AppResult<Paginated<TagView>> {
    state
        .cache
        .cached(keys::TAG_LIST, &page, None, async {
            let (tags, total) = state.tags.list(&page).await?;
            Ok(Paginated::new(tags, total, &page).map(TagView::from))
        })
        .await
}
