mod handler;
mod model;

pub use handler::{follow, follower_list, following_list, unfollow};
