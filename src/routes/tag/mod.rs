mod handler;
mod model;

pub use handler::show_all;
pub use model::TagView;
