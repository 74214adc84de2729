use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    auth::TokenPair,
    cache::keys,
    database::{Gender, NewUser, UserChanges, UserEntity, UserFilter},
    error::{AppError, AppResult, CredentialError},
    messages::PHONE_NUMBER_TAKEN,
    utils::{
        Page, Paginated, hash_password,
        validation::{validate_email, validate_password, validate_phone_number},
        verify_password,
    },
};

/// 登录表单，手机号未注册时自动创建用户
#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(custom(function = "validate_phone_number"))]
    pub username: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
}

/// 用户信息修改，只处理提供的字段
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UserEditRequest {
    #[validate(custom(function = "validate_phone_number"))]
    pub username: Option<String>,
    #[validate(custom(function = "validate_password"))]
    pub password: Option<String>,
    #[validate(custom(function = "validate_email"))]
    pub email: Option<String>,
    pub gender: Option<Gender>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl UserEditRequest {
    /// 空字符串视为未提供
    pub fn normalized(self) -> Self {
        Self {
            username: non_empty(self.username),
            password: non_empty(self.password),
            email: non_empty(self.email),
            gender: self.gender,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub gender: Option<Gender>,
    pub is_online: Option<bool>,
}

impl From<UserListQuery> for UserFilter {
    fn from(query: UserListQuery) -> Self {
        Self {
            search: non_empty(query.search),
            gender: query.gender,
            is_online: query.is_online,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub phone_number: String,
    pub email: Option<String>,
}

impl From<UserEntity> for UserSummary {
    fn from(user: UserEntity) -> Self {
        Self {
            phone_number: user.phone_number,
            email: user.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetail {
    pub phone_number: String,
    pub email: Option<String>,
    pub gender: Option<Gender>,
    pub is_online: bool,
    pub recipes: Vec<Uuid>,
}

/// 登录或注册
pub async fn login_create(state: &AppState, form: &LoginForm) -> AppResult<TokenPair> {
    match state.users.find_by_phone(&form.username).await? {
        Some(user) => {
            state
                .cache
                .invalidating(&keys::ONLINE_STATE_FAMILIES, login(state, user, &form.password))
                .await
        }
        None => {
            state
                .cache
                .invalidating(&[keys::USER_LIST], create(state, form))
                .await
        }
    }
}

async fn login(state: &AppState, user: UserEntity, password: &str) -> AppResult<TokenPair> {
    if !verify_password(password, &user.password_hash)? {
        return Err(CredentialError::InvalidCredentials.into());
    }

    state.users.set_online(user.id, true).await?;
    state.tokens.issue(user.id).await
}

async fn create(state: &AppState, form: &LoginForm) -> AppResult<TokenPair> {
    let password_hash = hash_password(&form.password, state.config.bcrypt_cost)?;
    let user = state
        .users
        .create(NewUser {
            phone_number: form.username.clone(),
            email: None,
            password_hash,
            is_online: true,
        })
        .await?;

    state.tokens.issue(user.id).await
}

pub async fn update(state: &AppState, user: &UserEntity, patch: UserEditRequest) -> AppResult<()> {
    if let Some(phone_number) = &patch.username {
        if let Some(owner) = state.users.find_by_phone(phone_number).await? {
            if owner.id != user.id {
                return Err(AppError::bad_request(PHONE_NUMBER_TAKEN));
            }
        }
    }

    let password_hash = patch
        .password
        .as_deref()
        .map(|password| hash_password(password, state.config.bcrypt_cost))
        .transpose()?;

    let changes = UserChanges {
        phone_number: patch.username,
        email: patch.email,
        gender: patch.gender,
        password_hash,
    };

    state
        .cache
        .invalidating(&keys::USER_WRITE_FAMILIES, async {
            state.users.update(user.id, &changes).await?;
            Ok(())
        })
        .await
}

pub async fn show_all(
    state: &AppState,
    filter: UserFilter,
    page: Page,
) -> AppResult<Paginated<UserSummary>> {
    state
        .cache
        .cached(keys::USER_LIST, &(&filter, &page), Some(keys::USER_LIST_TTL), async {
            let (users, total) = state.users.search(&filter, &page).await?;
            Ok(Paginated::new(users, total, &page).map(UserSummary::from))
        })
        .await
}

pub async fn show_detail(state: &AppState, user: &UserEntity) -> AppResult<UserDetail> {
    state
        .cache
        .cached(keys::USER_DETAIL, &user.id, None, async {
            // 以数据库中的最新状态为准
            let current = state
                .users
                .find_by_id(user.id)
                .await?
                .ok_or(CredentialError::InvalidCredentials)?;
            let recipes = state.recipes.uuids_by_user(user.id).await?;

            Ok(UserDetail {
                phone_number: current.phone_number,
                email: current.email,
                gender: current.gender,
                is_online: current.is_online,
                recipes,
            })
        })
        .await
}

pub async fn logout(state: &AppState, user: &UserEntity) -> AppResult<bool> {
    state
        .cache
        .invalidating(&keys::ONLINE_STATE_FAMILIES, async {
            state.users.set_online(user.id, false).await?;
            state.tokens.revoke(user.id).await
        })
        .await
}

pub async fn refresh(state: &AppState, user: &UserEntity, refresh_token: &str) -> AppResult<TokenPair> {
    state.tokens.rotate(user.id, refresh_token).await
}
