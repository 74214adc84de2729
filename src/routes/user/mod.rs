mod handler;
mod model;

pub use handler::{login_create, logout, refresh, show_all, show_detail, update};
pub use model::{LoginForm, UserDetail, UserEditRequest, UserListQuery, UserSummary};
