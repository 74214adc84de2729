// 字段校验，配合 validator 的 custom 属性使用

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use validator::ValidationError;

static PHONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+(?:[0-9] ?){6,14}[0-9]$").expect("valid phone regex"));

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\.-]+@[\w\.-]+\.\w+$").expect("valid email regex"));

static RECIPE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w.{8,}\w$").expect("valid title regex"));

// 正文允许换行
static RECIPE_CONTENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\w.{8,}\w$").expect("valid content regex"));

const MIN_PASSWORD_LEN: usize = 8;

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

pub fn validate_phone_number(phone_number: &str) -> Result<(), ValidationError> {
    if PHONE_NUMBER.is_match(phone_number) {
        Ok(())
    } else {
        Err(invalid("phone_number", "Invalid phone number"))
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid(
            "password",
            "Password must contain at least 8 characters",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(invalid(
            "password",
            "Password must contain at least one lowercase character",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(invalid(
            "password",
            "Password must contain at least one uppercase character",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid(
            "password",
            "Password must contain at least one digit character",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL.is_match(email) {
        Ok(())
    } else {
        Err(invalid("email", "Invalid email address"))
    }
}

pub fn validate_recipe_title(title: &str) -> Result<(), ValidationError> {
    if RECIPE_TITLE.is_match(title) {
        Ok(())
    } else {
        Err(invalid(
            "title",
            "Recipe title must contain at least 10 characters",
        ))
    }
}

pub fn validate_recipe_content(content: &str) -> Result<(), ValidationError> {
    if RECIPE_CONTENT.is_match(content) {
        Ok(())
    } else {
        Err(invalid(
            "content",
            "Recipe content must contain at least 10 characters",
        ))
    }
}
