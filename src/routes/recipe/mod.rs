mod handler;
mod model;

pub use handler::{create, delete, show_all, show_detail, update};
pub use model::{RecipeCreateRequest, RecipeDetail, RecipeEditRequest, RecipeSummary};
