use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// 用户数据库实体
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: i64,
    pub phone_number: String,
    pub email: Option<String>,
    pub gender: Option<Gender>,
    pub is_online: bool,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub phone_number: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub is_online: bool,
}

/// 用户更新字段，None 表示不修改
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub gender: Option<Gender>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserFilter {
    pub search: Option<String>,
    pub gender: Option<Gender>,
    pub is_online: Option<bool>,
}

/// 菜谱标签，由迁移脚本预置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "recipe_tag", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Breakfast,
    Lunch,
    Dinner,
    Dessert,
    Snack,
    Appetizer,
    Soup,
    Salad,
    Vegetarian,
    Vegan,
    GlutenFree,
    Quick,
    Healthy,
    Drink,
}

impl Tag {
    pub const ALL: [Tag; 14] = [
        Tag::Breakfast,
        Tag::Lunch,
        Tag::Dinner,
        Tag::Dessert,
        Tag::Snack,
        Tag::Appetizer,
        Tag::Soup,
        Tag::Salad,
        Tag::Vegetarian,
        Tag::Vegan,
        Tag::GlutenFree,
        Tag::Quick,
        Tag::Healthy,
        Tag::Drink,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Breakfast => "breakfast",
            Tag::Lunch => "lunch",
            Tag::Dinner => "dinner",
            Tag::Dessert => "dessert",
            Tag::Snack => "snack",
            Tag::Appetizer => "appetizer",
            Tag::Soup => "soup",
            Tag::Salad => "salad",
            Tag::Vegetarian => "vegetarian",
            Tag::Vegan => "vegan",
            Tag::GlutenFree => "gluten_free",
            Tag::Quick => "quick",
            Tag::Healthy => "healthy",
            Tag::Drink => "drink",
        }
    }

    pub fn display_title(&self) -> &'static str {
        match self {
            Tag::Breakfast => "Breakfast",
            Tag::Lunch => "Lunch",
            Tag::Dinner => "Dinner",
            Tag::Dessert => "Dessert",
            Tag::Snack => "Snack",
            Tag::Appetizer => "Appetizer",
            Tag::Soup => "Soup",
            Tag::Salad => "Salad",
            Tag::Vegetarian => "Vegetarian",
            Tag::Vegan => "Vegan",
            Tag::GlutenFree => "Gluten Free",
            Tag::Quick => "Quick & Easy",
            Tag::Healthy => "Healthy",
            Tag::Drink => "Drink",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| format!("unknown tag {}", s))
    }
}

/// 菜谱实体，带作者信息和标签
#[derive(Debug, Clone)]
pub struct RecipeEntity {
    pub id: i64,
    pub uuid: Uuid,
    pub user_id: i64,
    pub owner_phone_number: String,
    pub owner_email: Option<String>,
    pub title: String,
    pub content: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub is_active: bool,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_active: Option<bool>,
    pub tags: Option<Vec<Tag>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

/// 刷新令牌记录
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AccessTokenRecord {
    pub user_id: i64,
    pub refresh_token: String,
    pub refresh_token_expiration: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "log_level", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Debug,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: serde_json::Value,
}
