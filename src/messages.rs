use std::fmt;

/// 接口返回的提示信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<'a> {
    LoginUser { user: &'a str },
    FailedLoginUser { user: &'a str },
    UpdateUser { user: &'a str },
    LogoutUser { user: &'a str },
    RefreshToken { user: &'a str },
    CreateRecipe { title: &'a str, user: &'a str },
    UpdateRecipe { uuid: &'a str, user: &'a str },
    DeleteRecipe { uuid: &'a str, user: &'a str },
    FollowUser { user: &'a str, following: &'a str },
    UnfollowUser { user: &'a str, following: &'a str },
}

impl fmt::Display for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::LoginUser { user } => write!(f, "user '{}' login successfully", user),
            Message::FailedLoginUser { user } => write!(f, "user '{}' login failed", user),
            Message::UpdateUser { user } => write!(f, "user '{}' update successfully", user),
            Message::LogoutUser { user } => write!(f, "user '{}' logout successfully", user),
            Message::RefreshToken { user } => {
                write!(f, "refresh token for user '{}' update successfully", user)
            }
            Message::CreateRecipe { title, user } => {
                write!(f, "recipe '{}' for '{}' create successfully", title, user)
            }
            Message::UpdateRecipe { uuid, user } => {
                write!(f, "recipe '{}' updated by {} successfully", uuid, user)
            }
            Message::DeleteRecipe { uuid, user } => {
                write!(f, "recipe '{}' deleted by {} successfully", uuid, user)
            }
            Message::FollowUser { user, following } => {
                write!(f, "user '{}' follows '{}' successfully", user, following)
            }
            Message::UnfollowUser { user, following } => {
                write!(f, "user '{}' unfollow '{}' successfully", user, following)
            }
        }
    }
}

pub const WELCOME: &str = "welcome to FoodRecipeHub!!!";
pub const RECIPE_NOT_OWNED: &str = "The requested recipe does not belong to the authenticated user";
pub const RECIPE_NOT_FOUND: &str = "The requested recipe was not found";
pub const FOLLOWING_NOT_FOUND: &str = "The requested following not find";
pub const FOLLOWING_IS_SELF: &str = "Users can not follow themselves";
pub const ALREADY_FOLLOWING: &str = "The requested following is already followed by the authenticated user";
pub const NOT_FOLLOWING: &str = "The requested following does not followed to the authenticated user";
pub const PHONE_NUMBER_TAKEN: &str = "The requested phone number is already in use";
